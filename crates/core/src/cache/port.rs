use crate::cache::error::CacheError;
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;

/// # Summary
/// 业务无关的异步 KV 缓存接口 (Port)。
///
/// # Invariants
/// - 处理原始字节，确保 Trait 是对象安全的 (Object Safe)。
/// - 设置了 `ttl` 的条目在过期后对 `get_raw` 与 `keys` 不可见。
#[async_trait]
pub trait Cache: Send + Sync {
    /// # Summary
    /// 写入原始字节数据，同名键覆盖。
    ///
    /// # Arguments
    /// * `key`: 唯一键。
    /// * `value`: 原始字节数组。
    /// * `ttl`: 存活时间，`None` 表示永不过期。
    async fn set_raw(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// # Summary
    /// 获取原始字节数据。
    ///
    /// # Returns
    /// 存在且未过期则返回 `Some(Vec<u8>)`，否则返回 `None`。
    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// 删除指定键，键不存在时同样返回 Ok
    async fn del(&self, key: &str) -> Result<(), CacheError>;

    /// # Summary
    /// 列出以 `prefix` 开头且未过期的全部键。
    ///
    /// # Returns
    /// 键列表，顺序不作保证。
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, CacheError>;
}

/// # Summary
/// 缓存泛型扩展接口，提供 JSON 序列化支持。
///
/// # Invariants
/// - 自动为所有实现 `Cache` 的类型提供支持。
#[async_trait]
pub trait CacheExt: Cache {
    /// 序列化后写入
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value).map_err(|e| CacheError::Serialize(e.to_string()))?;
        self.set_raw(key, bytes, ttl).await
    }

    /// 读取后反序列化
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.get_raw(key).await? {
            Some(bytes) => {
                let val = serde_json::from_slice(&bytes)
                    .map_err(|e| CacheError::Deserialize(e.to_string()))?;
                Ok(Some(val))
            }
            None => Ok(None),
        }
    }
}

impl<T: Cache + ?Sized> CacheExt for T {}
