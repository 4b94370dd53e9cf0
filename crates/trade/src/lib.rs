//! # `simtrade-trade` - 交易与市场服务层
//!
//! * [`service::TransactionService`]：模拟订单的下单、结算、撤单。
//! * [`market::MarketService`]：场次 / 子市场 / 周期的生命周期。
//! * [`quote::QuoteBoard`]：基于缓存的行情看板。

pub mod market;
pub mod quote;
pub mod service;
