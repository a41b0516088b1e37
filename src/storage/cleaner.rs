// 存储清理模块 - 清空历史与按保留期清理过期扫描

use super::repository::ScanRepository;
use crate::event_bus::{AppEvent, EventBus};
use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{error, info};

/// 保留天数上限
pub const MAX_RETENTION_DAYS: i64 = 3650;

/// 存储清理器
pub struct StorageCleaner {
    /// 扫描仓库
    repository: Arc<dyn ScanRepository>,
    /// 事件总线
    event_bus: Arc<EventBus>,
    /// 数据保留天数（None 为永久保留）
    retention_days: RwLock<Option<i64>>,
    /// 数据库文件路径（用于统计大小）
    db_path: PathBuf,
}

impl StorageCleaner {
    /// 创建新的清理器
    pub fn new(
        repository: Arc<dyn ScanRepository>,
        event_bus: Arc<EventBus>,
        db_path: PathBuf,
    ) -> Self {
        Self {
            repository,
            event_bus,
            retention_days: RwLock::new(None),
            db_path,
        }
    }

    /// 校验保留天数（不修改状态）
    pub fn validate_retention_days(days: Option<i64>) -> Result<()> {
        if let Some(days) = days {
            if days < 1 {
                return Err(anyhow::anyhow!("保留天数必须至少为1天"));
            }
            if days > MAX_RETENTION_DAYS {
                return Err(anyhow::anyhow!("保留天数不能超过{}天", MAX_RETENTION_DAYS));
            }
        }
        Ok(())
    }

    /// 设置保留天数
    pub async fn set_retention_days(&self, days: Option<i64>) -> Result<()> {
        Self::validate_retention_days(days)?;

        *self.retention_days.write().await = days;
        match days {
            Some(d) => info!("数据保留天数已更新为: {}天", d),
            None => info!("数据保留期已关闭，永久保留"),
        }
        Ok(())
    }

    /// 获取当前保留天数
    pub async fn get_retention_days(&self) -> Option<i64> {
        *self.retention_days.read().await
    }

    /// 启动自动清理任务，返回任务句柄以便关闭时中止
    pub fn start_cleanup_task(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(3600)); // 每小时检查一次
            info!("存储清理任务已启动，每小时检查一次");

            loop {
                interval.tick().await;

                if let Err(e) = self.perform_cleanup().await {
                    error!("清理任务执行失败: {}", e);
                }
            }
        })
    }

    /// 按保留期删除过期扫描，未设置保留期时不做任何事
    pub async fn perform_cleanup(&self) -> Result<u64> {
        let Some(retention_days) = *self.retention_days.read().await else {
            return Ok(0);
        };

        let cutoff = Utc::now() - ChronoDuration::days(retention_days);
        info!("开始清理 {} 之前的扫描", cutoff.format("%Y-%m-%d"));

        let deleted = self.repository.delete_scans_before(cutoff).await?;
        if deleted > 0 {
            self.event_bus.publish(AppEvent::HistoryCleared {
                scans_deleted: deleted,
            });
        }

        info!("清理完成，删除了 {} 条扫描", deleted);
        Ok(deleted)
    }

    /// 清空全部扫描历史
    pub async fn clear_all(&self) -> Result<u64> {
        let deleted = self.repository.delete_all().await?;
        self.event_bus.publish(AppEvent::HistoryCleared {
            scans_deleted: deleted,
        });
        Ok(deleted)
    }

    /// 获取存储统计信息
    pub async fn get_storage_stats(&self) -> Result<StorageStats> {
        let summary = self.repository.count_summary().await?;
        let database_size = match tokio::fs::metadata(&self.db_path).await {
            Ok(metadata) => metadata.len(),
            Err(_) => 0,
        };

        Ok(StorageStats {
            scan_count: summary.total,
            detected_count: summary.detected,
            database_size,
            retention_days: self.get_retention_days().await,
        })
    }
}

/// 存储统计信息
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StorageStats {
    pub scan_count: i64,
    pub detected_count: i64,
    pub database_size: u64,
    pub retention_days: Option<i64>,
}
