use thiserror::Error;

use crate::store::error::StoreError;

/// # Summary
/// 场次 / 子市场 / 周期生命周期管理中的错误。
#[derive(Error, Debug)]
pub enum MarketError {
    #[error("场次不存在: {0}")]
    SessionNotFound(String),
    #[error("子市场不存在: {0}")]
    SubMarketNotFound(String),
    #[error("周期不存在: {0}")]
    CycleNotFound(String),
    /// 非法的状态迁移
    #[error("{entity} 不允许从 {from} 迁移到 {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },
    /// 业务前置条件不满足 (例如仍有未结算周期时关闭场次)
    #[error("操作被拒绝: {0}")]
    Rejected(String),
    #[error("参数错误: {0}")]
    InvalidInput(String),
    #[error("无法获取 {0} 的最新报价")]
    PriceUnavailable(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}
