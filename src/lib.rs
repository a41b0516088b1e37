// 皮肤扫描核心库 - 模拟检测、扫描记录存储与界面命令

// 声明模块
pub mod analysis;
pub mod capture;
pub mod commands;
pub mod event_bus;
pub mod logger;
pub mod models;
pub mod settings;
pub mod storage;
pub mod utils;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use analysis::{SimulatedDetector, SimulationParams};
use capture::ScanCapture;
use event_bus::EventBus;
use settings::SettingsManager;
use storage::{CachedRepository, ScanRepository, SqliteRepository, StorageCleaner};

/// 扫描记录缓存容量
const SCAN_CACHE_CAPACITY: usize = 64;

/// 事件总线容量
const EVENT_BUS_CAPACITY: usize = 100;

/// 应用状态
///
/// 所有共享组件在启动时构造一次，由界面层持有并传给每个命令，
/// 不使用任何全局可变状态
#[derive(Clone)]
pub struct AppState {
    /// 扫描仓库（带缓存）
    pub repository: Arc<dyn ScanRepository>,
    /// 扫描采集
    pub capture: Arc<ScanCapture>,
    /// 存储清理
    pub cleaner: Arc<StorageCleaner>,
    /// 设置
    pub settings: Arc<SettingsManager>,
    /// 事件总线
    pub event_bus: Arc<EventBus>,
    /// 自动清理任务句柄
    cleanup_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

/// 解析数据库路径，相对路径基于数据目录
fn resolve_db_path(data_dir: &Path, db_path: &str) -> PathBuf {
    let path = Path::new(db_path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        data_dir.join(path)
    }
}

/// 初始化应用状态
///
/// 存储无法打开时返回错误，应用应停止启动
pub async fn init_app_state(data_dir: &Path) -> anyhow::Result<AppState> {
    tokio::fs::create_dir_all(data_dir)
        .await
        .with_context(|| format!("无法创建数据目录: {:?}", data_dir))?;

    // 先初始化设置管理器，以便读取数据库配置
    let settings = Arc::new(SettingsManager::new(data_dir.join("settings.json")).await?);
    let initial_config = settings.get().await;

    let db_path = resolve_db_path(data_dir, &initial_config.database.db_path);
    info!("使用 SQLite 数据库: {:?}", db_path);

    let sqlite = SqliteRepository::new(
        &db_path.to_string_lossy(),
        initial_config.database.max_connections,
    )
    .await
    .context("扫描存储初始化失败")?;

    let repository: Arc<dyn ScanRepository> =
        Arc::new(CachedRepository::new(Arc::new(sqlite), SCAN_CACHE_CAPACITY));

    let event_bus = Arc::new(EventBus::new(EVENT_BUS_CAPACITY));

    let detector = Arc::new(SimulatedDetector::new(SimulationParams::for_quality(
        initial_config.high_quality_processing,
    )));
    let capture = Arc::new(ScanCapture::new(
        detector,
        repository.clone(),
        settings.clone(),
        event_bus.clone(),
    ));

    let cleaner = Arc::new(StorageCleaner::new(
        repository.clone(),
        event_bus.clone(),
        db_path,
    ));

    let mut cleanup_task = None;
    if let Some(days) = initial_config.retention_days {
        match cleaner.set_retention_days(Some(days)).await {
            Ok(()) => {
                cleanup_task = Some(cleaner.clone().start_cleanup_task());
            }
            Err(e) => warn!("保留天数配置无效，已忽略: {}", e),
        }
    }

    info!("应用状态初始化完成");

    Ok(AppState {
        repository,
        capture,
        cleaner,
        settings,
        event_bus,
        cleanup_task: Arc::new(Mutex::new(cleanup_task)),
    })
}

impl AppState {
    /// 确保自动清理任务在运行（保留天数开启后调用）
    pub async fn ensure_cleanup_task(&self) {
        let mut task = self.cleanup_task.lock().await;
        if task.is_none() {
            *task = Some(self.cleaner.clone().start_cleanup_task());
        }
    }

    /// 停止自动清理任务（保留天数关闭后调用）
    pub async fn stop_cleanup_task(&self) {
        if let Some(task) = self.cleanup_task.lock().await.take() {
            task.abort();
            info!("存储清理任务已停止");
        }
    }

    /// 是否有自动清理任务在运行
    pub async fn has_cleanup_task(&self) -> bool {
        self.cleanup_task.lock().await.is_some()
    }

    /// 关闭应用：丢弃进行中的扫描，停止后台任务，关闭数据库
    pub async fn shutdown(&self) {
        self.capture.cancel_pending();

        self.stop_cleanup_task().await;

        self.repository.close().await;
        info!("应用已关闭");
    }
}
