use thiserror::Error;

/// # Summary
/// 缓存错误。行情看板读写失败时由上层转换为业务错误。
#[derive(Error, Debug)]
pub enum CacheError {
    /// 值无法编码为 JSON
    #[error("Cache serialize error: {0}")]
    Serialize(String),
    /// 缓存内容无法解码为目标类型
    #[error("Cache deserialize error: {0}")]
    Deserialize(String),
    /// 底层存储故障
    #[error("Cache backend error: {0}")]
    Backend(String),
}
