//! # `simtrade-app` - 启动入口
//!
//! 纯粹的 DI 容器：加载配置、初始化日志、实例化存储与服务并注入 API 层。
//! 同时提供种子数据与后台账号运维命令。

pub mod accounts;
pub mod cli;
pub mod logging;
pub mod seed;
pub mod settings;
pub mod wiring;
