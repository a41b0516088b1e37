// 存储缓存层 - 使用 LRU 缓存加速结果页的单条读取

use super::error::StoreResult;
use super::repository::ScanRepository;
use crate::models::{HistoryFilter, ScanRecord, ScanSummary};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// 简单的 LRU 缓存实现
struct LruCache<K: Eq + Hash + Clone, V: Clone> {
    cache: HashMap<K, (V, usize)>,
    max_size: usize,
    current_tick: usize,
}

impl<K: Eq + Hash + Clone, V: Clone> LruCache<K, V> {
    fn new(max_size: usize) -> Self {
        Self {
            cache: HashMap::new(),
            max_size: max_size.max(1),
            current_tick: 0,
        }
    }

    fn get(&mut self, key: &K) -> Option<V> {
        if let Some((value, tick)) = self.cache.get_mut(key) {
            self.current_tick += 1;
            *tick = self.current_tick;
            Some(value.clone())
        } else {
            None
        }
    }

    fn put(&mut self, key: K, value: V) {
        self.current_tick += 1;

        // 如果缓存已满，移除最旧的项
        if self.cache.len() >= self.max_size && !self.cache.contains_key(&key) {
            if let Some(oldest_key) = self.find_oldest_key() {
                self.cache.remove(&oldest_key);
            }
        }

        self.cache.insert(key, (value, self.current_tick));
    }

    fn invalidate(&mut self, key: &K) {
        self.cache.remove(key);
    }

    fn clear(&mut self) {
        self.cache.clear();
        self.current_tick = 0;
    }

    fn len(&self) -> usize {
        self.cache.len()
    }

    fn find_oldest_key(&self) -> Option<K> {
        self.cache
            .iter()
            .min_by_key(|(_, (_, tick))| tick)
            .map(|(key, _)| key.clone())
    }
}

/// 带缓存的扫描仓库包装器
///
/// 记录不可修改，所以只需在删除时失效。
/// 单条读取持有读锁、删除持有写锁，保证已删除的记录不会被重新放回缓存
pub struct CachedRepository {
    /// 底层仓库
    inner: Arc<dyn ScanRepository>,
    /// 单条记录缓存
    scan_cache: Mutex<LruCache<String, ScanRecord>>,
    /// 读取与删除之间的顺序锁
    order_lock: RwLock<()>,
}

impl CachedRepository {
    /// 创建新的缓存仓库
    pub fn new(inner: Arc<dyn ScanRepository>, capacity: usize) -> Self {
        Self {
            inner,
            scan_cache: Mutex::new(LruCache::new(capacity)),
            order_lock: RwLock::new(()),
        }
    }

    /// 使单条缓存失效
    pub async fn invalidate_scan(&self, id: &str) {
        self.scan_cache.lock().await.invalidate(&id.to_string());
    }

    /// 清空所有缓存
    pub async fn clear_cache(&self) {
        self.scan_cache.lock().await.clear();
    }

    /// 当前缓存条目数
    pub async fn cached_len(&self) -> usize {
        self.scan_cache.lock().await.len()
    }
}

#[async_trait]
impl ScanRepository for CachedRepository {
    async fn initialize(&self) -> StoreResult<()> {
        self.inner.initialize().await
    }

    async fn insert_scan(&self, record: &ScanRecord) -> StoreResult<()> {
        let _order = self.order_lock.write().await;
        self.inner.insert_scan(record).await?;
        self.scan_cache
            .lock()
            .await
            .put(record.id.clone(), record.clone());
        Ok(())
    }

    async fn delete_scan(&self, id: &str) -> StoreResult<bool> {
        let _order = self.order_lock.write().await;
        let deleted = self.inner.delete_scan(id).await?;
        self.invalidate_scan(id).await;
        Ok(deleted)
    }

    async fn delete_all(&self) -> StoreResult<u64> {
        let _order = self.order_lock.write().await;
        let removed = self.inner.delete_all().await?;
        self.clear_cache().await;
        Ok(removed)
    }

    async fn delete_scans_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let _order = self.order_lock.write().await;
        let removed = self.inner.delete_scans_before(cutoff).await?;
        self.clear_cache().await;
        Ok(removed)
    }

    async fn get_scan(&self, id: &str) -> StoreResult<Option<ScanRecord>> {
        let _order = self.order_lock.read().await;
        let key = id.to_string();

        if let Some(record) = self.scan_cache.lock().await.get(&key) {
            return Ok(Some(record));
        }

        let record = self.inner.get_scan(id).await?;
        if let Some(ref r) = record {
            self.scan_cache.lock().await.put(key, r.clone());
        }
        Ok(record)
    }

    async fn get_all_scans(&self) -> StoreResult<Vec<ScanRecord>> {
        self.inner.get_all_scans().await
    }

    async fn query_scans(&self, filter: &HistoryFilter) -> StoreResult<Vec<ScanRecord>> {
        self.inner.query_scans(filter).await
    }

    async fn count_summary(&self) -> StoreResult<ScanSummary> {
        self.inner.count_summary().await
    }

    fn db_type(&self) -> &str {
        self.inner.db_type()
    }

    async fn close(&self) {
        self.clear_cache().await;
        self.inner.close().await;
    }
}
