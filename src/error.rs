//! 错误处理模块
//!
//! 定义应用程序的统一错误类型

use thiserror::Error;

/// Pulse Relay 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum PulseRelayError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 转发相关错误
    #[error("转发错误: {0}")]
    Forward(#[from] ForwardError),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },
}

/// 转发错误类型
#[derive(Error, Debug)]
pub enum ForwardError {
    /// HTTP客户端不可用
    #[error("HTTP client unavailable: {0}")]
    ClientUnavailable(String),

    /// HTTP请求错误
    #[error("{0}")]
    RequestError(#[from] reqwest::Error),
}

impl ForwardError {
    /// 格式化错误信息，使其更加清晰易读
    pub fn describe(&self) -> String {
        match self {
            ForwardError::ClientUnavailable(reason) => {
                format!("HTTP client unavailable: {}", reason)
            }
            ForwardError::RequestError(error) => {
                if error.is_timeout() {
                    "Request timeout".to_string()
                } else if error.is_connect() {
                    format!("Connection failed: {}", error)
                } else if error.is_builder() {
                    format!("Invalid request: {}", error)
                } else if error.is_decode() {
                    "Response decode error".to_string()
                } else {
                    format!("Request failed: {}", error)
                }
            }
        }
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, PulseRelayError>;
