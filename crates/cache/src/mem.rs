use async_trait::async_trait;
use dashmap::DashMap;
use simtrade_core::cache::error::CacheError;
use simtrade_core::cache::port::Cache;
use std::time::{Duration, Instant};

/// 缓存条目：数据与可选的过期时刻
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|t| t <= now)
    }
}

/// # Summary
/// 基于 DashMap 的内存缓存实现，支持按条目过期。
///
/// # Invariants
/// - 所有操作均通过并发哈希表 `DashMap` 执行，保证多线程安全。
/// - 过期条目采用惰性删除：读取或枚举时发现过期即移除。
pub struct MemCache {
    storage: DashMap<String, Entry>,
}

impl MemCache {
    pub fn new() -> Self {
        Self {
            storage: DashMap::new(),
        }
    }

    /// 主动清理全部过期条目，返回清理数量
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.storage.len();
        self.storage.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.storage.len())
    }
}

impl Default for MemCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for MemCache {
    async fn set_raw(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at = ttl.map(|d| Instant::now() + d);
        self.storage.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    /// # Logic
    /// 命中过期条目时顺手删除并返回 None。
    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = Instant::now();
        let expired = match self.storage.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.storage.remove_if(key, |_, e| e.is_expired(now));
        }
        Ok(None)
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.storage.remove(key);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        let now = Instant::now();
        Ok(self
            .storage
            .iter()
            .filter(|e| e.key().starts_with(prefix) && !e.value().is_expired(now))
            .map(|e| e.key().clone())
            .collect())
    }
}
