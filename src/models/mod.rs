// 数据模型模块 - 定义所有的数据结构

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

pub use crate::storage::config::DatabaseConfig;

/// 未检测到异常时的建议
pub const RECOMMENDATION_CLEAR: &str = "No anomalies detected. Continue regular monitoring.";
/// 低严重度建议
pub const RECOMMENDATION_LOW: &str = "Monitor for 2 weeks. Take photos to track changes.";
/// 中严重度建议
pub const RECOMMENDATION_MEDIUM: &str = "Schedule appointment with dermatologist within 2–4 weeks.";
/// 高严重度建议
pub const RECOMMENDATION_HIGH: &str = "Consult dermatologist as soon as possible.";

/// 异常严重度（有序：Low < Medium < High）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Low
    }
}

impl Severity {
    /// 数据库中存储的文本形式
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(Severity::Low),
            "Medium" => Ok(Severity::Medium),
            "High" => Ok(Severity::High),
            other => Err(format!("未知的严重度: {}", other)),
        }
    }
}

/// 异常区域在原图坐标系中的矩形
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// 扫描记录 - 一次检测的完整结果，创建后不可修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    /// 唯一ID（主键）
    pub id: String,
    /// 创建时间
    pub timestamp: DateTime<Utc>,
    /// 图片引用（不校验、不解引用）
    pub image_ref: Option<String>,
    /// 是否检测到异常
    pub anomaly_detected: bool,
    /// 严重度，未检测到异常时为 Low
    pub severity: Severity,
    /// 置信度百分比 [0, 100]，已取整
    pub confidence: f64,
    /// 扫描部位
    pub body_area: String,
    /// 异常区域，仅在检测到异常时存在
    pub bounding_box: Option<BoundingBox>,
    /// 建议文本，由 (anomaly_detected, severity) 推导
    pub recommendation: String,
    /// 备注
    pub notes: Option<String>,
}

impl ScanRecord {
    /// 根据检测结果推导建议文本
    pub fn recommendation_for(anomaly_detected: bool, severity: Severity) -> &'static str {
        if !anomaly_detected {
            return RECOMMENDATION_CLEAR;
        }

        match severity {
            Severity::Low => RECOMMENDATION_LOW,
            Severity::Medium => RECOMMENDATION_MEDIUM,
            Severity::High => RECOMMENDATION_HIGH,
        }
    }
}

/// 历史统计（总数/检出/正常）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanSummary {
    pub total: i64,
    pub detected: i64,
    pub clear: i64,
}

impl ScanSummary {
    /// 由总数和检出数构造，clear 始终为两者之差
    pub fn from_counts(total: i64, detected: i64) -> Self {
        Self {
            total,
            detected,
            clear: total - detected,
        }
    }
}

/// 日期范围（闭区间）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// 历史记录过滤条件，所有字段可选
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryFilter {
    pub severity: Option<Severity>,
    pub date_range: Option<DateRange>,
    pub anomaly_detected: Option<bool>,
}

impl HistoryFilter {
    /// 只看检出异常的记录
    pub fn detected() -> Self {
        Self {
            anomaly_detected: Some(true),
            ..Default::default()
        }
    }

    /// 只看正常记录
    pub fn clear() -> Self {
        Self {
            anomaly_detected: Some(false),
            ..Default::default()
        }
    }

    /// 内存中的匹配判断（与 SQL 查询语义一致）
    pub fn matches(&self, record: &ScanRecord) -> bool {
        if let Some(severity) = self.severity {
            if record.severity != severity {
                return false;
            }
        }
        if let Some(detected) = self.anomaly_detected {
            if record.anomaly_detected != detected {
                return false;
            }
        }
        if let Some(range) = self.date_range {
            if record.timestamp < range.start || record.timestamp > range.end {
                return false;
            }
        }
        true
    }
}

/// 应用配置（部分更新）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 是否自动保存扫描结果
    pub auto_save_scans: Option<bool>,
    /// 是否启用高质量处理（更慢）
    pub high_quality_processing: Option<bool>,
    /// 数据保留天数：字段缺省为不修改，显式 null 为永久保留
    #[serde(default, deserialize_with = "deserialize_present")]
    pub retention_days: Option<Option<i64>>,
    /// UI设置
    pub ui_settings: Option<UISettings>,
    /// 数据库配置
    pub database: Option<DatabaseConfig>,
}

/// 字段出现即为 Some，值为 null 时得到 Some(None)
fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// 持久化的应用配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedAppConfig {
    /// 是否自动保存扫描结果
    pub auto_save_scans: bool,
    /// 是否启用高质量处理
    pub high_quality_processing: bool,
    /// 数据保留天数（None 为永久保留）
    #[serde(default)]
    pub retention_days: Option<i64>,
    /// UI设置
    #[serde(default)]
    pub ui_settings: UISettings,
    /// 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Default for PersistedAppConfig {
    fn default() -> Self {
        Self {
            auto_save_scans: true,
            high_quality_processing: false,
            retention_days: None,
            ui_settings: UISettings::default(),
            database: DatabaseConfig::default(),
        }
    }
}

/// UI设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UISettings {
    /// 是否开启提醒通知
    pub notifications_enabled: bool,
    /// 深色模式
    pub dark_mode: bool,
}

impl Default for UISettings {
    fn default() -> Self {
        Self {
            notifications_enabled: true,
            dark_mode: false,
        }
    }
}
