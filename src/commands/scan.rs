//! 扫描命令
//!
//! 拍摄按钮和结果页使用的接口

use crate::analysis::pick_body_area;
use crate::models::ScanRecord;
use crate::utils::validation::validate_scan_id;
use crate::AppState;

/// 拍摄并分析
///
/// # 参数
/// - `image_ref`: 拍摄得到的图片引用
/// - `body_area`: 扫描部位，为空时随机识别一个
///
/// # 返回
/// - `Ok(ScanRecord)`: 扫描结果（自动保存开启时已写入存储）
/// - `Err(String)`: 错误信息，包括已有扫描在进行
pub async fn start_scan(
    state: &AppState,
    image_ref: String,
    body_area: Option<String>,
) -> Result<ScanRecord, String> {
    let body_area = match body_area {
        Some(area) if !area.trim().is_empty() => area,
        _ => pick_body_area(&mut rand::thread_rng()).to_string(),
    };

    state
        .capture
        .capture(&image_ref, &body_area)
        .await
        .map_err(|e| e.to_string())
}

/// 界面销毁时丢弃进行中的扫描
pub fn cancel_scan(state: &AppState) {
    state.capture.cancel_pending();
}

/// 是否有扫描在进行
pub fn is_scanning(state: &AppState) -> bool {
    state.capture.is_scanning()
}

/// 结果页按ID读取扫描记录，不存在时返回 None
pub async fn get_scan_result(state: &AppState, scan_id: String) -> Result<Option<ScanRecord>, String> {
    validate_scan_id(&scan_id)?;
    state
        .repository
        .get_scan(&scan_id)
        .await
        .map_err(|e| e.to_string())
}
