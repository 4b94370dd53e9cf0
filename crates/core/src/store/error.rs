use rust_decimal::Decimal;
use thiserror::Error;

/// # Summary
/// 存储层错误枚举，处理数据库连接、读写失败与约束冲突。
///
/// # Invariants
/// - 必须通过 `thiserror` 派生 `Error` trait。
#[derive(Error, Debug)]
pub enum StoreError {
    /// 数据库操作失败
    #[error("Database error: {0}")]
    Database(String),
    /// 记录未找到
    #[error("Not found: {0}")]
    NotFound(String),
    /// 唯一约束、外键约束或并发状态冲突
    #[error("Conflict: {0}")]
    Conflict(String),
    /// 扣款后余额将为负
    #[error("Insufficient balance: required {required}, available {actual}")]
    InsufficientBalance { required: Decimal, actual: Decimal },
    /// 已落库的数据无法解析为领域类型
    #[error("Corrupted record: {0}")]
    Corrupted(String),
    /// 初始化存储失败
    #[error("Initialization error: {0}")]
    InitError(String),
}
