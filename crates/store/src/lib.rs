//! # `simtrade-store` - SQLite 持久化层
//!
//! 为 `simtrade-core::store::port` 中的每个存储端口提供基于 `sqlx` + SQLite 的实现。
//! 所有存储共享同一个 `Database` 连接池 (`<data_dir>/app.db`)。

pub mod admin;
pub mod content;
pub mod db;
pub mod market;
pub mod system;
pub mod transaction;
pub mod user;

pub use db::Database;
