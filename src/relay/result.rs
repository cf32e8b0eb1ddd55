//! 转发结果数据结构

use serde::Serialize;

/// 响应体片段的最大字符数
pub const TEXT_SNIPPET_CHARS: usize = 300;

/// 单个目标的投递结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RelayOutcome {
    /// 收到响应
    Delivered {
        /// HTTP状态码
        code: u16,
        /// 截断后的响应体
        text_snippet: String,
    },
    /// 传输失败或超时
    Failed {
        /// 错误描述
        error: String,
    },
}

/// 一次投递尝试的结果，按目标顺序返回，不做持久化
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayResult {
    /// 目标地址
    pub url: String,
    /// 投递结果
    #[serde(flatten)]
    pub outcome: RelayOutcome,
}

impl RelayResult {
    /// 创建成功投递的结果，响应体截断到 [`TEXT_SNIPPET_CHARS`] 个字符
    pub fn delivered(url: impl Into<String>, code: u16, body: &str) -> Self {
        Self {
            url: url.into(),
            outcome: RelayOutcome::Delivered {
                code,
                text_snippet: body.chars().take(TEXT_SNIPPET_CHARS).collect(),
            },
        }
    }

    /// 创建失败结果
    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            outcome: RelayOutcome::Failed {
                error: error.into(),
            },
        }
    }

    /// 是否收到了下游响应（不论状态码）
    pub fn is_delivered(&self) -> bool {
        matches!(self.outcome, RelayOutcome::Delivered { .. })
    }

    /// 状态码（如果收到响应）
    pub fn status_code(&self) -> Option<u16> {
        match self.outcome {
            RelayOutcome::Delivered { code, .. } => Some(code),
            RelayOutcome::Failed { .. } => None,
        }
    }
}
