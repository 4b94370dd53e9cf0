//! # `simtrade-client` - 后台 REST 客户端
//!
//! 面向后台前端或运维脚本的 HTTP 客户端。
//!
//! ## 行为
//! - 每个请求自动附带 `Authorization: Bearer <access_token>`。
//! - 收到 401 时发起一次刷新，多个并发请求共享同一次刷新结果，随后各自重试一次。
//! - 刷新失败时清空令牌并广播 [`AuthEvent::SessionExpired`]。
//! - 收到 403 时广播 [`AuthEvent::Forbidden`]。

pub mod admin;
pub mod client;
pub mod error;

pub use client::{ApiClient, AuthEvent};
pub use error::ClientError;
