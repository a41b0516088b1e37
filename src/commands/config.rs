//! 配置管理命令
//!
//! 提供应用配置的读取和更新接口

use std::sync::Arc;

use tracing::info;

use crate::analysis::{SimulatedDetector, SimulationParams};
use crate::event_bus::AppEvent;
use crate::models::{AppConfig, PersistedAppConfig};
use crate::storage::StorageCleaner;
use crate::AppState;

/// 获取应用配置
pub async fn get_app_config(state: &AppState) -> Result<PersistedAppConfig, String> {
    Ok(state.settings.get().await)
}

/// 更新配置
pub async fn update_config(
    state: &AppState,
    config: AppConfig,
) -> Result<PersistedAppConfig, String> {
    // 先校验保留天数，失败时不写入配置
    if let Some(retention_days) = config.retention_days {
        StorageCleaner::validate_retention_days(retention_days).map_err(|e| e.to_string())?;
    }

    let previous = state.settings.get().await;
    let updated = state
        .settings
        .update(config.clone())
        .await
        .map_err(|e| e.to_string())?;

    // 写入成功后再应用到运行中的组件
    if let Some(retention_days) = config.retention_days {
        state
            .cleaner
            .set_retention_days(retention_days)
            .await
            .map_err(|e| e.to_string())?;
        match retention_days {
            Some(_) => state.ensure_cleanup_task().await,
            None => state.stop_cleanup_task().await,
        }
    }

    if updated.high_quality_processing != previous.high_quality_processing {
        let params = SimulationParams::for_quality(updated.high_quality_processing);
        state
            .capture
            .replace_detector(Arc::new(SimulatedDetector::new(params)));
        info!("高质量处理: {}", updated.high_quality_processing);
    }

    if config.database.is_some() {
        info!("数据库配置已更新，下次启动生效");
    }

    state.event_bus.publish(AppEvent::ConfigUpdated {
        config_type: "app".to_string(),
    });
    Ok(updated)
}
