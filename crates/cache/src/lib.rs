//! # `simtrade-cache`
//!
//! `Cache` 端口的进程内实现，供行情看板使用。

pub mod mem;
