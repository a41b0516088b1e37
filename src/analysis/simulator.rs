// 模拟检测器 - 用参数化的随机策略代替真实的图像处理与推理
//
// 所有随机量均取自 [0,1) 上的均匀分布

use super::{AnalysisError, AnomalyDetector};
use crate::models::{BoundingBox, ScanRecord, Severity};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

/// 未指定部位时随机选取的候选部位
pub const BODY_AREAS: [&str; 8] = [
    "Left arm",
    "Right arm",
    "Left leg",
    "Right leg",
    "Back",
    "Chest",
    "Face",
    "Neck",
];

/// 模拟参数
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParams {
    /// 检出异常的概率
    pub detection_probability: f64,
    /// 严重度权重（Low, Medium, High），按累积概率抽取
    pub severity_weights: [f64; 3],
    /// 检出时的置信度区间
    pub detected_confidence: (f64, f64),
    /// 未检出时的置信度区间
    pub clear_confidence: (f64, f64),
    /// 矩形左上角坐标区间
    pub box_origin: (f64, f64),
    /// 矩形宽高区间
    pub box_size: (f64, f64),
    /// 模拟处理耗时
    pub processing_delay: Duration,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            detection_probability: 0.6,
            severity_weights: [0.6, 0.3, 0.1],
            detected_confidence: (70.0, 100.0),
            clear_confidence: (80.0, 100.0),
            box_origin: (50.0, 200.0),
            box_size: (40.0, 120.0),
            processing_delay: Duration::from_millis(2000),
        }
    }
}

impl SimulationParams {
    /// 高质量处理：结果分布相同，耗时更长
    pub fn high_quality() -> Self {
        Self {
            processing_delay: Duration::from_millis(3000),
            ..Default::default()
        }
    }

    /// 根据设置选择参数
    pub fn for_quality(high_quality: bool) -> Self {
        if high_quality {
            Self::high_quality()
        } else {
            Self::default()
        }
    }

    /// 设置处理耗时
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.processing_delay = delay;
        self
    }
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, (low, high): (f64, f64)) -> f64 {
    low + rng.gen::<f64>() * (high - low)
}

fn draw_severity<R: Rng + ?Sized>(rng: &mut R, weights: &[f64; 3]) -> Severity {
    let roll = rng.gen::<f64>();
    if roll < weights[0] {
        Severity::Low
    } else if roll < weights[0] + weights[1] {
        Severity::Medium
    } else {
        Severity::High
    }
}

/// 随机选取一个扫描部位
pub fn pick_body_area<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    BODY_AREAS[rng.gen_range(0..BODY_AREAS.len())]
}

/// 按参数抽取一次检测结果（不含等待）
pub fn simulate_scan<R: Rng + ?Sized>(
    params: &SimulationParams,
    rng: &mut R,
    image_ref: &str,
    body_area: &str,
    timestamp: DateTime<Utc>,
) -> ScanRecord {
    let anomaly_detected = rng.gen::<f64>() < params.detection_probability;

    let severity = if anomaly_detected {
        draw_severity(rng, &params.severity_weights)
    } else {
        Severity::Low
    };

    let confidence_range = if anomaly_detected {
        params.detected_confidence
    } else {
        params.clear_confidence
    };
    let confidence = uniform(rng, confidence_range).round();

    let bounding_box = if anomaly_detected {
        Some(BoundingBox {
            x: uniform(rng, params.box_origin),
            y: uniform(rng, params.box_origin),
            width: uniform(rng, params.box_size),
            height: uniform(rng, params.box_size),
        })
    } else {
        None
    };

    ScanRecord {
        id: uuid::Uuid::new_v4().to_string(),
        timestamp,
        image_ref: (!image_ref.is_empty()).then(|| image_ref.to_string()),
        anomaly_detected,
        severity,
        confidence,
        body_area: body_area.to_string(),
        bounding_box,
        recommendation: ScanRecord::recommendation_for(anomaly_detected, severity).to_string(),
        notes: None,
    }
}

/// 模拟检测器
pub struct SimulatedDetector {
    params: SimulationParams,
    rng: Mutex<StdRng>,
}

impl SimulatedDetector {
    /// 使用系统熵初始化随机源
    pub fn new(params: SimulationParams) -> Self {
        Self {
            params,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// 使用固定种子（可复现）
    pub fn with_seed(params: SimulationParams, seed: u64) -> Self {
        Self {
            params,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// 当前参数
    pub fn params(&self) -> &SimulationParams {
        &self.params
    }
}

#[async_trait]
impl AnomalyDetector for SimulatedDetector {
    async fn analyze(&self, image_ref: &str, body_area: &str) -> Result<ScanRecord, AnalysisError> {
        debug!(
            "模拟分析开始: 部位={}, 预计耗时={:?}",
            body_area, self.params.processing_delay
        );

        // 模拟处理耗时，不阻塞运行时
        tokio::time::sleep(self.params.processing_delay).await;

        let record = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            simulate_scan(&self.params, &mut *rng, image_ref, body_area, Utc::now())
        };

        info!(
            "模拟分析完成: id={}, 检出={}, 严重度={}, 置信度={}",
            record.id, record.anomaly_detected, record.severity, record.confidence
        );
        Ok(record)
    }
}
