//! 存储层错误类型

use thiserror::Error;

/// 存储操作结果类型
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// 存储错误
#[derive(Error, Debug)]
pub enum StoreError {
    /// 主键冲突（重复的扫描ID）
    #[error("约束冲突: {0}")]
    ConstraintViolation(String),

    /// 存储无法打开或初始化（磁盘、权限等）
    #[error("存储不可用: {0}")]
    StorageUnavailable(String),

    /// 写入前校验失败
    #[error("无效的扫描记录: {0}")]
    InvalidRecord(String),

    /// 读取到无法还原的数据行
    #[error("数据行损坏 (id={id}): {reason}")]
    CorruptRow { id: String, reason: String },

    /// SQLx 错误
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    /// 文件系统错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// 将写入时的 sqlx 错误归类，唯一键冲突映射为 ConstraintViolation
    pub fn from_write(err: sqlx::Error, id: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::ConstraintViolation(format!("扫描ID已存在: {}", id));
            }
        }
        StoreError::Database(err)
    }

    /// 打开/初始化阶段的错误统一视为存储不可用
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        StoreError::StorageUnavailable(err.to_string())
    }

    pub fn corrupt(id: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::CorruptRow {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
