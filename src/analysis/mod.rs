//! 检测分析模块
//!
//! 定义检测能力接口 `AnomalyDetector`，调用方只依赖这一个方法：
//! - simulator: 随机模拟检测（当前唯一实现）
//!
//! 真实的端侧模型实现只需实现同一个 trait 即可替换

pub mod simulator;

pub use simulator::{pick_body_area, SimulatedDetector, SimulationParams, BODY_AREAS};

use crate::models::ScanRecord;
use async_trait::async_trait;
use thiserror::Error;

/// 检测错误（模拟器不会产生，真实后端使用）
///
/// 调用方应将其视为可恢复错误：提示重试，不保存任何部分结果
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// 模型加载失败
    #[error("模型加载失败: {0}")]
    ModelLoad(String),

    /// 图片解码失败
    #[error("图片解码失败: {0}")]
    ImageDecode(String),

    /// 推理失败
    #[error("推理失败: {0}")]
    Inference(String),
}

/// 检测能力接口
#[async_trait]
pub trait AnomalyDetector: Send + Sync {
    /// 分析一张图片，返回完整的扫描记录
    ///
    /// # 参数
    /// * `image_ref` - 图片引用（不透明字符串）
    /// * `body_area` - 扫描部位
    ///
    /// # 返回
    /// * 扫描记录（ID 与时间戳已分配）
    async fn analyze(&self, image_ref: &str, body_area: &str) -> Result<ScanRecord, AnalysisError>;
}
