//! 转发模块
//!
//! 提供目标规范化、顺序扇出投递和单次探测功能

pub mod forwarder;
pub mod result;
pub mod target;

// 重新导出主要类型
pub use forwarder::{HttpForwarder, PulseForwarder, DEFAULT_REQUEST_TIMEOUT, PULSE_TOKEN_HEADER};
pub use result::{RelayOutcome, RelayResult};
pub use target::{build_targets, TargetNormalizer, RELAY_PATH_SUFFIX};
