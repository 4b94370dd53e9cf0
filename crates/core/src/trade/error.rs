use rust_decimal::Decimal;
use thiserror::Error;

use crate::market::error::MarketError;
use crate::store::error::StoreError;

/// # Summary
/// 下单、结算、撤单过程中可能出现的错误。
#[derive(Error, Debug)]
pub enum TradeError {
    #[error("订单不存在: {0}")]
    TransactionNotFound(String),
    #[error("用户不存在: {0}")]
    UserNotFound(String),
    #[error("用户状态不允许交易: {0}")]
    UserNotActive(String),
    #[error("可用余额不足. 需要: {required}, 实际: {actual}")]
    InsufficientBalance { required: Decimal, actual: Decimal },
    #[error("收益率必须位于 0 到 10 之间: {0}")]
    InvalidReturnRate(Decimal),
    #[error("订单状态不允许该操作: {0}")]
    InvalidStatus(String),
    #[error("无法确定价格: {0}")]
    PriceUnavailable(String),
    #[error("参数错误: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Market(#[from] MarketError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
