//! 历史命令
//!
//! 历史页与数据管理使用的接口，包括：
//! - 历史列表与过滤
//! - 统计卡片
//! - 删除、清空与导出

use std::path::PathBuf;

use tracing::info;

use crate::event_bus::AppEvent;
use crate::models::{HistoryFilter, ScanRecord, ScanSummary};
use crate::storage::{export_scans, StorageStats};
use crate::utils::validation::validate_scan_id;
use crate::AppState;

/// 获取历史列表（按时间倒序），不传过滤条件时返回全部
pub async fn get_scan_history(
    state: &AppState,
    filter: Option<HistoryFilter>,
) -> Result<Vec<ScanRecord>, String> {
    let result = match filter {
        Some(filter) => state.repository.query_scans(&filter).await,
        None => state.repository.get_all_scans().await,
    };
    result.map_err(|e| e.to_string())
}

/// 获取统计卡片数据
pub async fn get_scan_summary(state: &AppState) -> Result<ScanSummary, String> {
    state
        .repository
        .count_summary()
        .await
        .map_err(|e| e.to_string())
}

/// 删除单条扫描，不存在时不报错
pub async fn delete_scan(state: &AppState, scan_id: String) -> Result<(), String> {
    validate_scan_id(&scan_id)?;
    let deleted = state
        .repository
        .delete_scan(&scan_id)
        .await
        .map_err(|e| e.to_string())?;

    if deleted {
        info!("扫描已删除: {}", scan_id);
        state.event_bus.publish(AppEvent::ScanDeleted { scan_id });
    }
    Ok(())
}

/// 清空全部历史，返回删除条数
pub async fn clear_history(state: &AppState) -> Result<u64, String> {
    info!("清空扫描历史");
    state.cleaner.clear_all().await.map_err(|e| e.to_string())
}

/// 导出历史为 JSON 文件，返回导出条数
pub async fn export_history(state: &AppState, path: PathBuf) -> Result<usize, String> {
    export_scans(state.repository.as_ref(), &path)
        .await
        .map_err(|e| e.to_string())
}

/// 获取存储统计
pub async fn get_storage_stats(state: &AppState) -> Result<StorageStats, String> {
    state
        .cleaner
        .get_storage_stats()
        .await
        .map_err(|e| e.to_string())
}
