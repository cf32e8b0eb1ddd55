//! 配置管理模块
//!
//! 提供环境变量/配置文件解析与数值回退功能

pub mod loader;
pub mod types;

// 重新导出主要类型
pub use loader::{ConfigLoader, EnvConfigLoader};
pub use types::{ConfigSource, RelayConfig};
