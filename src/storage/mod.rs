// 存储模块 - 扫描记录的持久化抽象层

// 子模块
pub mod cache;
pub mod cleaner;
pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod repository;

// 重新导出主要类型
pub use cache::CachedRepository;
pub use cleaner::{StorageCleaner, StorageStats};
pub use config::DatabaseConfig;
pub use error::{StoreError, StoreResult};
pub use export::export_scans;
pub use repository::ScanRepository;

// 重新导出具体实现
pub use repository::sqlite::SqliteRepository;
