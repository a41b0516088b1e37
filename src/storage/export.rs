// 数据导出 - 将扫描历史导出为 JSON 文件

use super::repository::ScanRepository;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// 导出所有扫描记录（按时间倒序）为 JSON 数组，返回导出条数
pub async fn export_scans(repository: &dyn ScanRepository, path: &Path) -> Result<usize> {
    let scans = repository.get_all_scans().await?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_string_pretty(&scans)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("写入导出文件失败: {}", path.display()))?;

    info!("已导出 {} 条扫描记录到 {}", scans.len(), path.display());
    Ok(scans.len())
}
