//! # `simtrade-core` - 领域核心
//!
//! 模拟交易后台的领域模型、端口 (Port) 抽象与纯业务规则。
//!
//! ## 模块划分
//! - `account`: 平台用户与后台管理员
//! - `trade`: 模拟订单 (Transaction) 与结算算法
//! - `market`: 场次 / 子市场 / 周期的生命周期状态机，以及行情看板条目
//! - `content`: CMS 内容 (评价、轮播、排行榜)
//! - `system`: 系统设置、IP 白名单、刷新令牌
//! - `store` / `cache`: 基础设施端口
//!
//! 本 crate 不依赖任何具体的数据库或 Web 框架。

pub mod account;
pub mod cache;
pub mod common;
pub mod config;
pub mod content;
pub mod market;
pub mod store;
pub mod system;
pub mod trade;
