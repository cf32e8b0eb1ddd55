//! Pulse Relay - 保活与脉冲转发服务
//!
//! 这是一个用Rust编写的小型HTTP服务，支持：
//! - 接收脉冲负载并按顺序转发到多个下游目标
//! - 按随机间隔向下游发送心跳，防止其休眠
//! - 单次探测/转发的命令行模式
//! - 结构化日志记录

pub mod cli;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod logging;
pub mod relay;
pub mod web;

// 重新导出主要类型
pub use config::{ConfigLoader, EnvConfigLoader, RelayConfig};
pub use error::PulseRelayError;
pub use relay::{HttpForwarder, PulseForwarder, RelayResult, TargetNormalizer};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
