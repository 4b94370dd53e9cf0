//! # `simtrade-api` - HTTP API 网关
//!
//! 本 crate 是模拟交易后台的 HTTP/REST 服务入口。
//! 使用 `axum` 构建路由与控制器，通过 `utoipa` 自动生成 OpenAPI 3.0 Swagger 文档。
//!
//! ## 架构职责
//! - 接收来自后台管理端或 `simtrade-client` 的 HTTP 请求
//! - 执行 JWT 鉴权、角色校验与 IP 白名单拦截后分发至各路由组
//! - 调用下层 `TransactionService` / `MarketService` / 各存储端口完成业务操作
//! - 将领域模型转换为 DTO 返回给前端

pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod types;
