//! 输入验证工具函数
//!
//! 提供扫描ID、扫描部位和扫描记录的校验，在写入存储和命令入口处使用

use crate::models::{BoundingBox, ScanRecord, Severity};

/// 扫描ID最大长度
pub const MAX_SCAN_ID_LEN: usize = 128;

/// 验证扫描ID是否有效
///
/// # 参数
/// - `id`: 扫描ID
///
/// # 返回
/// - `Ok(())`: 验证通过
/// - `Err(String)`: 错误信息
pub fn validate_scan_id(id: &str) -> Result<(), String> {
    if id.trim().is_empty() {
        return Err("扫描 ID 不能为空".to_string());
    }
    if id.len() > MAX_SCAN_ID_LEN {
        return Err(format!("扫描 ID 过长: {} 字符", id.len()));
    }
    Ok(())
}

/// 验证扫描部位
pub fn validate_body_area(body_area: &str) -> Result<(), String> {
    if body_area.trim().is_empty() {
        return Err("扫描部位不能为空".to_string());
    }
    Ok(())
}

/// 验证置信度在 [0, 100] 内
pub fn validate_confidence(confidence: f64) -> Result<(), String> {
    if !confidence.is_finite() || !(0.0..=100.0).contains(&confidence) {
        return Err(format!("置信度超出范围 [0, 100]: {}", confidence));
    }
    Ok(())
}

/// 验证矩形：四个分量都必须是有限的非负数
pub fn validate_bounding_box(bbox: &BoundingBox) -> Result<(), String> {
    let fields = [
        ("x", bbox.x),
        ("y", bbox.y),
        ("width", bbox.width),
        ("height", bbox.height),
    ];
    for (name, value) in fields {
        if !value.is_finite() || value < 0.0 {
            return Err(format!("矩形字段 {} 无效: {}", name, value));
        }
    }
    Ok(())
}

/// 写入前的完整校验
///
/// 除字段本身外，还要求记录内部一致：
/// - 置信度已取整
/// - 未检出的记录严重度为 Low 且没有矩形
/// - 建议文本与 (是否检出, 严重度) 对应
pub fn validate_scan_record(record: &ScanRecord) -> Result<(), String> {
    validate_scan_id(&record.id)?;
    validate_body_area(&record.body_area)?;
    validate_confidence(record.confidence)?;
    if record.confidence != record.confidence.round() {
        return Err(format!("置信度必须为整数: {}", record.confidence));
    }

    if let Some(bbox) = &record.bounding_box {
        if !record.anomaly_detected {
            return Err("未检出的扫描不能带有矩形".to_string());
        }
        validate_bounding_box(bbox)?;
    }
    if !record.anomaly_detected && record.severity != Severity::Low {
        return Err(format!("未检出的扫描严重度必须为 Low: {}", record.severity));
    }

    let expected = ScanRecord::recommendation_for(record.anomaly_detected, record.severity);
    if record.recommendation != expected {
        return Err(format!("建议文本与检测结果不符: {}", record.recommendation));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record() -> ScanRecord {
        ScanRecord {
            id: "scan-1".to_string(),
            timestamp: Utc::now(),
            image_ref: None,
            anomaly_detected: true,
            severity: Severity::Medium,
            confidence: 88.0,
            body_area: "Back".to_string(),
            bounding_box: Some(BoundingBox {
                x: 0.0,
                y: 10.0,
                width: 40.0,
                height: 60.0,
            }),
            recommendation: ScanRecord::recommendation_for(true, Severity::Medium).to_string(),
            notes: None,
        }
    }

    #[test]
    fn test_valid_record_passes() {
        assert!(validate_scan_record(&record()).is_ok());
    }

    #[test]
    fn test_rejects_bad_fields() {
        let mut r = record();
        r.confidence = 100.5;
        assert!(validate_scan_record(&r).is_err());

        let mut r = record();
        r.confidence = f64::NAN;
        assert!(validate_scan_record(&r).is_err());

        let mut r = record();
        r.id = "  ".to_string();
        assert!(validate_scan_record(&r).is_err());

        let mut r = record();
        r.bounding_box = Some(BoundingBox {
            x: -1.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        });
        assert!(validate_scan_record(&r).is_err());
    }

    #[test]
    fn test_rejects_inconsistent_records() {
        let mut r = record();
        r.confidence = 85.37;
        assert!(validate_scan_record(&r).is_err());

        let mut r = record();
        r.recommendation = "arbitrary text".to_string();
        assert!(validate_scan_record(&r).is_err());

        // 未检出却带矩形
        let mut r = record();
        r.anomaly_detected = false;
        r.severity = Severity::Low;
        r.recommendation = ScanRecord::recommendation_for(false, Severity::Low).to_string();
        assert!(validate_scan_record(&r).is_err());

        // 未检出却标记为 High
        r.bounding_box = None;
        assert!(validate_scan_record(&r).is_ok());
        r.severity = Severity::High;
        r.recommendation = ScanRecord::recommendation_for(false, Severity::High).to_string();
        assert!(validate_scan_record(&r).is_err());
    }

    #[test]
    fn test_scan_id_length_limit() {
        assert!(validate_scan_id(&"a".repeat(MAX_SCAN_ID_LEN)).is_ok());
        assert!(validate_scan_id(&"a".repeat(MAX_SCAN_ID_LEN + 1)).is_err());
    }
}
