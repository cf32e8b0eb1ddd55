//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Pulse Relay - 保活与脉冲转发服务
#[derive(Parser, Debug, Clone)]
#[command(
    name = "pulse-relay",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 配置文件路径
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径（TOML）",
        env = "PULSE_RELAY_CONFIG"
    )]
    pub config: Option<PathBuf>,

    /// 日志级别
    #[arg(
        short,
        long,
        value_enum,
        default_value = "info",
        help = "日志级别",
        env = "PULSE_RELAY_LOG_LEVEL"
    )]
    pub log_level: LogLevel,

    /// 是否输出JSON格式日志
    #[arg(long, help = "输出JSON格式日志", env = "PULSE_RELAY_LOG_JSON")]
    pub log_json: bool,

    /// 监听端口，覆盖 PORT 配置
    #[arg(short, long, value_name = "PORT", help = "监听端口（覆盖 PORT）")]
    pub port: Option<u16>,

    /// 单次模式：不启动服务器，执行一次后退出
    #[arg(long, help = "执行一次探测或转发后退出")]
    pub once: bool,

    /// 单次模式的动作
    #[arg(
        long,
        value_enum,
        default_value = "probe",
        help = "单次模式的动作",
        requires = "once"
    )]
    pub once_mode: OnceMode,
}

/// 日志级别枚举
#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum LogLevel {
    /// 跟踪级别
    Trace,
    /// 调试级别
    Debug,
    /// 信息级别
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

/// 单次模式动作
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnceMode {
    /// GET 探测地址
    Probe,
    /// 向所有目标转发 ping 负载
    Relay,
}

impl std::fmt::Display for OnceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OnceMode::Probe => write!(f, "probe"),
            OnceMode::Relay => write!(f, "relay"),
        }
    }
}
