// SQLite 存储实现

use super::ScanRepository;
use crate::models::{HistoryFilter, ScanRecord, ScanSummary};
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::models::{format_timestamp, rows_into_records, ScanRow, SCAN_COLUMNS};
use crate::utils::validation::validate_scan_record;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{Sqlite, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row};
use tracing::{debug, info};

/// SQLite 存储实现
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// 打开（必要时创建）SQLite 数据库并初始化表结构
    ///
    /// 任何打开阶段的失败都返回 StorageUnavailable
    pub async fn new(db_path: &str, max_connections: u32) -> StoreResult<Self> {
        info!("初始化 SQLite 数据库: {}", db_path);

        // 确保数据库文件的目录存在
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            std::fs::create_dir_all(parent).map_err(StoreError::unavailable)?;
        }

        // 创建连接池
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .min_connections(1)
            .idle_timeout(std::time::Duration::from_secs(300))
            .max_lifetime(std::time::Duration::from_secs(1800))
            .acquire_timeout(std::time::Duration::from_secs(10))
            .connect(&format!("sqlite:{}?mode=rwc", db_path))
            .await
            .map_err(StoreError::unavailable)?;

        let repo = Self { pool };

        // 初始化表结构
        repo.initialize().await.map_err(|e| match e {
            StoreError::StorageUnavailable(_) => e,
            other => StoreError::unavailable(other),
        })?;

        Ok(repo)
    }

    /// 获取连接池引用
    pub fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ScanRepository for SqliteRepository {
    async fn initialize(&self) -> StoreResult<()> {
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&self.pool)
            .await?;

        // 矩形四列全有或全无由编组层保证，表结构本身不约束
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scans (
                id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                image_ref TEXT,
                anomaly_detected INTEGER NOT NULL,
                severity TEXT NOT NULL,
                confidence REAL NOT NULL,
                body_area TEXT NOT NULL,
                bbox_x REAL,
                bbox_y REAL,
                bbox_width REAL,
                bbox_height REAL,
                recommendation TEXT NOT NULL,
                notes TEXT
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_scans_timestamp ON scans(timestamp)")
            .execute(&self.pool)
            .await?;

        debug!("scans 表结构已就绪");
        Ok(())
    }

    async fn insert_scan(&self, record: &ScanRecord) -> StoreResult<()> {
        validate_scan_record(record).map_err(StoreError::InvalidRecord)?;
        let row = ScanRow::from(record);

        sqlx::query(
            r#"
            INSERT INTO scans (
                id, timestamp, image_ref, anomaly_detected, severity, confidence,
                body_area, bbox_x, bbox_y, bbox_width, bbox_height,
                recommendation, notes
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
        )
        .bind(&row.id)
        .bind(&row.timestamp)
        .bind(&row.image_ref)
        .bind(row.anomaly_detected)
        .bind(&row.severity)
        .bind(row.confidence)
        .bind(&row.body_area)
        .bind(row.bbox_x)
        .bind(row.bbox_y)
        .bind(row.bbox_width)
        .bind(row.bbox_height)
        .bind(&row.recommendation)
        .bind(&row.notes)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_write(e, &row.id))?;

        debug!("扫描记录已写入: {}", row.id);
        Ok(())
    }

    async fn delete_scan(&self, id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM scans WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM scans")
            .execute(&self.pool)
            .await?;

        info!("已清空扫描历史: {} 条", result.rows_affected());
        Ok(result.rows_affected())
    }

    async fn delete_scans_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM scans WHERE timestamp < ?")
            .bind(format_timestamp(&cutoff))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn get_scan(&self, id: &str) -> StoreResult<Option<ScanRecord>> {
        let row = sqlx::query_as::<_, ScanRow>(&format!(
            "SELECT {} FROM scans WHERE id = ?",
            SCAN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ScanRow::into_record).transpose()
    }

    async fn get_all_scans(&self) -> StoreResult<Vec<ScanRecord>> {
        let rows = sqlx::query_as::<_, ScanRow>(&format!(
            "SELECT {} FROM scans ORDER BY timestamp DESC",
            SCAN_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows_into_records(rows)
    }

    async fn query_scans(&self, filter: &HistoryFilter) -> StoreResult<Vec<ScanRecord>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM scans WHERE 1 = 1", SCAN_COLUMNS));

        if let Some(severity) = filter.severity {
            builder.push(" AND severity = ").push_bind(severity.as_str());
        }
        if let Some(detected) = filter.anomaly_detected {
            builder.push(" AND anomaly_detected = ").push_bind(detected);
        }
        if let Some(range) = filter.date_range {
            builder
                .push(" AND timestamp >= ")
                .push_bind(format_timestamp(&range.start))
                .push(" AND timestamp <= ")
                .push_bind(format_timestamp(&range.end));
        }
        builder.push(" ORDER BY timestamp DESC");

        let rows = builder
            .build_query_as::<ScanRow>()
            .fetch_all(&self.pool)
            .await?;

        rows_into_records(rows)
    }

    async fn count_summary(&self) -> StoreResult<ScanSummary> {
        // 单条语句，总数和检出数来自同一快照
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, COALESCE(SUM(anomaly_detected), 0) AS detected FROM scans",
        )
        .fetch_one(&self.pool)
        .await?;

        let total: i64 = row.try_get("total")?;
        let detected: i64 = row.try_get("detected")?;
        Ok(ScanSummary::from_counts(total, detected))
    }

    fn db_type(&self) -> &str {
        "sqlite"
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("SQLite 连接池已关闭");
    }
}
