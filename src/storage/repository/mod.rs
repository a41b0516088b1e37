// Repository 抽象层 - 定义扫描记录的存储接口

pub mod sqlite;

use super::error::StoreResult;
use crate::models::{HistoryFilter, ScanRecord, ScanSummary};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// 扫描记录存储接口 - 所有存储实现必须实现此 trait
///
/// 记录写入后不可修改，只能删除
#[async_trait]
pub trait ScanRepository: Send + Sync {
    // ========== 初始化 ==========

    /// 初始化表结构（幂等）
    async fn initialize(&self) -> StoreResult<()>;

    // ========== 写入 ==========

    /// 插入一条扫描记录，ID 重复时返回 ConstraintViolation
    async fn insert_scan(&self, record: &ScanRecord) -> StoreResult<()>;

    /// 删除扫描记录，返回是否确实删除（不存在时不是错误）
    async fn delete_scan(&self, id: &str) -> StoreResult<bool>;

    /// 清空所有扫描记录，返回删除数量
    async fn delete_all(&self) -> StoreResult<u64>;

    /// 删除早于指定时间的扫描记录
    async fn delete_scans_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;

    // ========== 查询 ==========

    /// 获取单条扫描记录
    async fn get_scan(&self, id: &str) -> StoreResult<Option<ScanRecord>>;

    /// 获取所有扫描记录（按时间倒序）
    async fn get_all_scans(&self) -> StoreResult<Vec<ScanRecord>>;

    /// 按条件查询扫描记录（按时间倒序）
    async fn query_scans(&self, filter: &HistoryFilter) -> StoreResult<Vec<ScanRecord>>;

    /// 统计信息，一次查询得出
    async fn count_summary(&self) -> StoreResult<ScanSummary>;

    // ========== 元数据 ==========

    /// 获取存储类型标识
    fn db_type(&self) -> &str;

    /// 关闭底层连接
    async fn close(&self);
}
