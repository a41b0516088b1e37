// 扫描采集模块 - 一次拍摄到一条保存记录的完整流程
//
// 同一时间只允许一个扫描在进行，第二次请求直接拒绝
// 界面销毁时调用 cancel_pending，进行中的结果被丢弃，不写入存储

use crate::analysis::{AnalysisError, AnomalyDetector};
use crate::event_bus::{AppEvent, EventBus};
use crate::models::ScanRecord;
use crate::settings::SettingsManager;
use crate::storage::{ScanRepository, StoreError};
use crate::utils::validation::validate_body_area;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// 采集错误
#[derive(Error, Debug)]
pub enum CaptureError {
    /// 已有扫描在进行
    #[error("已有扫描正在进行")]
    ScanInProgress,

    /// 扫描被取消，结果已丢弃
    #[error("扫描已取消")]
    Cancelled,

    /// 输入无效
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 检测失败
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// 保存失败
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// 进行中标记，离开作用域（包括 future 被丢弃）时自动释放
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// 扫描采集管理器
pub struct ScanCapture {
    /// 检测器（可在运行时替换）
    detector: RwLock<Arc<dyn AnomalyDetector>>,
    /// 扫描仓库
    repository: Arc<dyn ScanRepository>,
    /// 设置（读取自动保存开关）
    settings: Arc<SettingsManager>,
    /// 事件总线
    event_bus: Arc<EventBus>,
    /// 是否有扫描在进行
    in_flight: AtomicBool,
    /// 取消代数，每次取消加一
    cancel_tx: watch::Sender<u64>,
}

impl ScanCapture {
    /// 创建新的采集管理器
    pub fn new(
        detector: Arc<dyn AnomalyDetector>,
        repository: Arc<dyn ScanRepository>,
        settings: Arc<SettingsManager>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let (cancel_tx, _) = watch::channel(0);
        Self {
            detector: RwLock::new(detector),
            repository,
            settings,
            event_bus,
            in_flight: AtomicBool::new(false),
            cancel_tx,
        }
    }

    /// 是否有扫描在进行（界面据此禁用拍摄按钮）
    pub fn is_scanning(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// 替换检测器，进行中的扫描继续使用旧的检测器
    pub fn replace_detector(&self, detector: Arc<dyn AnomalyDetector>) {
        let mut current = self.detector.write().unwrap_or_else(|e| e.into_inner());
        *current = detector;
        info!("检测器已替换");
    }

    fn current_detector(&self) -> Arc<dyn AnomalyDetector> {
        self.detector
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// 丢弃进行中的扫描
    pub fn cancel_pending(&self) {
        if self.is_scanning() {
            info!("取消进行中的扫描");
        }
        self.cancel_tx.send_modify(|generation| *generation += 1);
    }

    /// 分析一张图片并（按设置）保存结果
    pub async fn capture(&self, image_ref: &str, body_area: &str) -> Result<ScanRecord, CaptureError> {
        validate_body_area(body_area).map_err(CaptureError::InvalidInput)?;

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("已有扫描正在进行，拒绝新的拍摄请求");
            return Err(CaptureError::ScanInProgress);
        }
        let _guard = InFlightGuard(&self.in_flight);

        // 占位之后再订阅，之前发出的取消不影响本次扫描
        let mut cancel_rx = self.cancel_tx.subscribe();
        let _ = cancel_rx.borrow_and_update();

        info!("开始扫描: 部位={}", body_area);
        self.event_bus.publish(AppEvent::ScanStarted {
            body_area: body_area.to_string(),
        });

        let detector = self.current_detector();
        let outcome = tokio::select! {
            result = detector.analyze(image_ref, body_area) => result,
            _ = cancel_rx.changed() => {
                info!("扫描已取消，结果丢弃");
                self.event_bus.publish(AppEvent::ScanDiscarded {
                    reason: "cancelled".to_string(),
                });
                return Err(CaptureError::Cancelled);
            }
        };

        let record = match outcome {
            Ok(record) => record,
            Err(e) => {
                error!("扫描分析失败: {}", e);
                self.event_bus.publish(AppEvent::ScanFailed {
                    error: e.to_string(),
                });
                return Err(e.into());
            }
        };

        self.event_bus.publish(AppEvent::ScanCompleted {
            scan_id: record.id.clone(),
            anomaly_detected: record.anomaly_detected,
            severity: record.severity,
        });

        if !self.settings.get().await.auto_save_scans {
            info!("自动保存已关闭，扫描 {} 未保存", record.id);
            return Ok(record);
        }

        // 读取设置期间可能收到取消
        if cancel_rx.has_changed().unwrap_or(false) {
            info!("扫描已取消，结果丢弃");
            self.event_bus.publish(AppEvent::ScanDiscarded {
                reason: "cancelled".to_string(),
            });
            return Err(CaptureError::Cancelled);
        }

        if let Err(e) = self.repository.insert_scan(&record).await {
            error!("保存扫描结果失败: {}", e);
            self.event_bus.publish(AppEvent::ScanFailed {
                error: e.to_string(),
            });
            return Err(e.into());
        }

        info!("扫描结果已保存: {}", record.id);
        self.event_bus.publish(AppEvent::ScanSaved {
            scan_id: record.id.clone(),
        });
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{SimulatedDetector, SimulationParams};
    use crate::models::{AppConfig, Severity};
    use crate::storage::SqliteRepository;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};
    use tokio::sync::Notify;

    /// 等待放行信号后才返回结果的检测器
    struct GatedDetector {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl AnomalyDetector for GatedDetector {
        async fn analyze(&self, image_ref: &str, body_area: &str) -> Result<ScanRecord, AnalysisError> {
            self.gate.notified().await;
            Ok(ScanRecord {
                id: uuid::Uuid::new_v4().to_string(),
                timestamp: Utc::now(),
                image_ref: Some(image_ref.to_string()),
                anomaly_detected: true,
                severity: Severity::High,
                confidence: 85.0,
                body_area: body_area.to_string(),
                bounding_box: Some(crate::models::BoundingBox {
                    x: 50.0,
                    y: 50.0,
                    width: 40.0,
                    height: 40.0,
                }),
                recommendation: ScanRecord::recommendation_for(true, Severity::High).to_string(),
                notes: None,
            })
        }
    }

    struct FailingDetector;

    #[async_trait]
    impl AnomalyDetector for FailingDetector {
        async fn analyze(&self, _image_ref: &str, _body_area: &str) -> Result<ScanRecord, AnalysisError> {
            Err(AnalysisError::ImageDecode("truncated jpeg".to_string()))
        }
    }

    struct Fixture {
        _dir: TempDir,
        repo: Arc<dyn ScanRepository>,
        settings: Arc<SettingsManager>,
        bus: Arc<EventBus>,
    }

    async fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let db = dir.path().join("capture.db");
        let repo: Arc<dyn ScanRepository> =
            Arc::new(SqliteRepository::new(db.to_str().unwrap(), 2).await.unwrap());
        let settings = Arc::new(SettingsManager::new(dir.path().join("settings.json")).await.unwrap());
        Fixture {
            _dir: dir,
            repo,
            settings,
            bus: Arc::new(EventBus::new(32)),
        }
    }

    fn capture_with(f: &Fixture, detector: Arc<dyn AnomalyDetector>) -> Arc<ScanCapture> {
        Arc::new(ScanCapture::new(
            detector,
            f.repo.clone(),
            f.settings.clone(),
            f.bus.clone(),
        ))
    }

    async fn wait_until_scanning(capture: &ScanCapture) {
        for _ in 0..200 {
            if capture.is_scanning() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("扫描未开始");
    }

    #[tokio::test]
    async fn test_capture_persists_record() {
        let f = fixture().await;
        let detector = Arc::new(SimulatedDetector::with_seed(
            SimulationParams::default().with_delay(Duration::ZERO),
            42,
        ));
        let capture = capture_with(&f, detector);
        let mut events = f.bus.subscribe();

        let record = capture.capture("mock-image-uri", "Left arm").await.unwrap();

        assert_eq!(f.repo.get_scan(&record.id).await.unwrap(), Some(record.clone()));
        assert!(!capture.is_scanning());
        assert!(matches!(events.recv().await.unwrap(), AppEvent::ScanStarted { .. }));
        assert!(matches!(events.recv().await.unwrap(), AppEvent::ScanCompleted { .. }));
        assert_eq!(
            events.recv().await.unwrap(),
            AppEvent::ScanSaved { scan_id: record.id }
        );
    }

    #[tokio::test]
    async fn test_second_capture_rejected_while_pending() {
        let f = fixture().await;
        let gate = Arc::new(Notify::new());
        let capture = capture_with(&f, Arc::new(GatedDetector { gate: gate.clone() }));

        let first = {
            let capture = capture.clone();
            tokio::spawn(async move { capture.capture("img-1", "Back").await })
        };
        wait_until_scanning(&capture).await;

        let second = capture.capture("img-2", "Back").await;
        assert!(matches!(second, Err(CaptureError::ScanInProgress)));

        gate.notify_one();
        let record = first.await.unwrap().unwrap();
        assert_eq!(record.image_ref.as_deref(), Some("img-1"));
        assert_eq!(f.repo.count_summary().await.unwrap().total, 1);

        // 完成后可以再次拍摄
        assert!(!capture.is_scanning());
    }

    #[tokio::test]
    async fn test_cancel_discards_pending_result() {
        let f = fixture().await;
        let gate = Arc::new(Notify::new());
        let capture = capture_with(&f, Arc::new(GatedDetector { gate: gate.clone() }));
        let mut events = f.bus.subscribe();

        let pending = {
            let capture = capture.clone();
            tokio::spawn(async move { capture.capture("img", "Face").await })
        };
        wait_until_scanning(&capture).await;

        capture.cancel_pending();
        let result = pending.await.unwrap();
        assert!(matches!(result, Err(CaptureError::Cancelled)));
        assert!(!capture.is_scanning());
        assert_eq!(f.repo.count_summary().await.unwrap().total, 0);

        assert!(matches!(events.recv().await.unwrap(), AppEvent::ScanStarted { .. }));
        assert!(matches!(events.recv().await.unwrap(), AppEvent::ScanDiscarded { .. }));

        // 之前的取消不影响之后的扫描
        gate.notify_one();
        let record = capture.capture("img-2", "Face").await.unwrap();
        assert!(f.repo.get_scan(&record.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cancel_before_scan_starts_is_not_applied() {
        let f = fixture().await;
        let gate = Arc::new(Notify::new());
        let capture = capture_with(&f, Arc::new(GatedDetector { gate: gate.clone() }));

        // 空闲时的取消（例如上一次界面销毁）不作用于新的扫描
        capture.cancel_pending();
        capture.cancel_pending();

        let pending = {
            let capture = capture.clone();
            tokio::spawn(async move { capture.capture("img", "Chest").await })
        };
        wait_until_scanning(&capture).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        gate.notify_one();
        let record = pending.await.unwrap().unwrap();
        assert!(f.repo.get_scan(&record.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_dropped_capture_releases_slot_without_writing() {
        let f = fixture().await;
        let gate = Arc::new(Notify::new());
        let capture = capture_with(&f, Arc::new(GatedDetector { gate }));

        let pending = {
            let capture = capture.clone();
            tokio::spawn(async move { capture.capture("img", "Neck").await })
        };
        wait_until_scanning(&capture).await;

        pending.abort();
        assert!(pending.await.unwrap_err().is_cancelled());
        assert!(!capture.is_scanning());
        assert_eq!(f.repo.count_summary().await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_auto_save_disabled_returns_without_persisting() {
        let f = fixture().await;
        f.settings
            .update(AppConfig {
                auto_save_scans: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        let detector = Arc::new(SimulatedDetector::new(
            SimulationParams::default().with_delay(Duration::ZERO),
        ));
        let capture = capture_with(&f, detector);

        let record = capture.capture("img", "Chest").await.unwrap();
        assert_eq!(f.repo.get_scan(&record.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_analysis_failure_is_not_persisted() {
        let f = fixture().await;
        let capture = capture_with(&f, Arc::new(FailingDetector));

        let result = capture.capture("img", "Chest").await;
        assert!(matches!(
            result,
            Err(CaptureError::Analysis(AnalysisError::ImageDecode(_)))
        ));
        assert!(!capture.is_scanning());
        assert_eq!(f.repo.count_summary().await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_replace_detector_applies_to_next_scan() {
        let f = fixture().await;
        let capture = capture_with(&f, Arc::new(FailingDetector));
        assert!(capture.capture("img", "Back").await.is_err());

        capture.replace_detector(Arc::new(SimulatedDetector::new(
            SimulationParams::default().with_delay(Duration::ZERO),
        )));
        let record = capture.capture("img", "Back").await.unwrap();
        assert!(f.repo.get_scan(&record.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_blank_body_area_rejected() {
        let f = fixture().await;
        let capture = capture_with(&f, Arc::new(FailingDetector));
        assert!(matches!(
            capture.capture("img", "  ").await,
            Err(CaptureError::InvalidInput(_))
        ));
    }
}
