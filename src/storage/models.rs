// 数据库行结构 - ScanRecord 与 scans 表之间的编组
//
// 矩形在表中展开为四个可空列，写入时全有或全无，读取时只有四列都非空才还原

use super::error::{StoreError, StoreResult};
use crate::models::{BoundingBox, ScanRecord, Severity};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;

/// scans 表的查询列
pub const SCAN_COLUMNS: &str = "id, timestamp, image_ref, anomaly_detected, severity, confidence, \
     body_area, bbox_x, bbox_y, bbox_width, bbox_height, recommendation, notes";

/// 时间戳的存储格式：固定纳秒精度的 RFC3339，保证字典序与时间序一致
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// scans 表的一行
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ScanRow {
    pub id: String,
    pub timestamp: String,
    pub image_ref: Option<String>,
    pub anomaly_detected: bool,
    pub severity: String,
    pub confidence: f64,
    pub body_area: String,
    pub bbox_x: Option<f64>,
    pub bbox_y: Option<f64>,
    pub bbox_width: Option<f64>,
    pub bbox_height: Option<f64>,
    pub recommendation: String,
    pub notes: Option<String>,
}

impl From<&ScanRecord> for ScanRow {
    fn from(record: &ScanRecord) -> Self {
        let (bbox_x, bbox_y, bbox_width, bbox_height) = match record.bounding_box {
            Some(b) => (Some(b.x), Some(b.y), Some(b.width), Some(b.height)),
            None => (None, None, None, None),
        };

        Self {
            id: record.id.clone(),
            timestamp: format_timestamp(&record.timestamp),
            image_ref: record.image_ref.clone(),
            anomaly_detected: record.anomaly_detected,
            severity: record.severity.as_str().to_string(),
            confidence: record.confidence,
            body_area: record.body_area.clone(),
            bbox_x,
            bbox_y,
            bbox_width,
            bbox_height,
            recommendation: record.recommendation.clone(),
            notes: record.notes.clone(),
        }
    }
}

impl ScanRow {
    /// 还原矩形：四列都非空才存在，部分为空视为不存在
    fn bounding_box(&self) -> Option<BoundingBox> {
        match (self.bbox_x, self.bbox_y, self.bbox_width, self.bbox_height) {
            (Some(x), Some(y), Some(width), Some(height)) => Some(BoundingBox {
                x,
                y,
                width,
                height,
            }),
            (None, None, None, None) => None,
            _ => {
                warn!("扫描 {} 的矩形列部分为空，按无矩形处理", self.id);
                None
            }
        }
    }

    /// 转换为领域模型
    pub fn into_record(self) -> StoreResult<ScanRecord> {
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| StoreError::corrupt(&self.id, format!("时间戳无法解析: {}", e)))?
            .with_timezone(&Utc);
        let severity = self
            .severity
            .parse::<Severity>()
            .map_err(|e| StoreError::corrupt(&self.id, e))?;
        let bounding_box = self.bounding_box();

        Ok(ScanRecord {
            id: self.id,
            timestamp,
            image_ref: self.image_ref,
            anomaly_detected: self.anomaly_detected,
            severity,
            confidence: self.confidence,
            body_area: self.body_area,
            bounding_box,
            recommendation: self.recommendation,
            notes: self.notes,
        })
    }
}

/// 批量转换
pub fn rows_into_records(rows: Vec<ScanRow>) -> StoreResult<Vec<ScanRecord>> {
    rows.into_iter().map(ScanRow::into_record).collect()
}
