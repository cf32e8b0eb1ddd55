//! 脉冲转发器实现
//!
//! 按顺序向每个目标 POST 负载，目标之间插入固定延迟，单个目标失败不影响其余目标

use crate::error::ForwardError;
use crate::relay::result::RelayResult;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

/// 转发时携带共享密钥的请求头
pub const PULSE_TOKEN_HEADER: &str = "X-PULSE-TOKEN";

/// 单次请求超时
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// 转发器trait，定义投递接口
#[async_trait]
pub trait PulseForwarder: Send + Sync {
    /// 向单个目标投递负载
    ///
    /// # 参数
    /// * `target` - 目标地址
    /// * `payload` - JSON负载
    /// * `token` - 可选的共享密钥
    ///
    /// # 返回
    /// * `RelayResult` - 投递结果，失败也以结果形式返回
    async fn deliver(&self, target: &str, payload: &Value, token: Option<&str>) -> RelayResult;

    /// 向单个地址发送一次 GET 探测
    ///
    /// # 返回
    /// * `Result<u16, ForwardError>` - 响应状态码
    async fn probe(&self, url: &str) -> Result<u16, ForwardError>;

    /// 依次向所有目标投递负载
    ///
    /// 结果数量与顺序与 `targets` 一致。非最后一个目标之后等待 `inter_target_delay`。
    ///
    /// # 参数
    /// * `payload` - JSON负载
    /// * `targets` - 规范化后的目标列表
    /// * `token` - 可选的共享密钥
    /// * `inter_target_delay` - 目标间延迟
    async fn relay(
        &self,
        payload: &Value,
        targets: &[String],
        token: Option<&str>,
        inter_target_delay: Duration,
    ) -> Vec<RelayResult> {
        let mut results = Vec::with_capacity(targets.len());

        for (idx, target) in targets.iter().enumerate() {
            let result = self.deliver(target, payload, token).await;
            match result.status_code() {
                Some(code) => info!("转发到 {} -> {}", target, code),
                None => warn!("转发到 {} 失败: {:?}", target, result.outcome),
            }
            results.push(result);

            if !inter_target_delay.is_zero() && idx + 1 < targets.len() {
                tokio::time::sleep(inter_target_delay).await;
            }
        }

        results
    }
}

/// 基于 reqwest 的转发器实现
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    /// HTTP客户端
    client: Client,
}

impl HttpForwarder {
    /// 创建新的HTTP转发器
    ///
    /// # 参数
    /// * `timeout` - 单次请求超时时间
    ///
    /// # 返回
    /// * `Result<Self, ForwardError>` - 客户端构建失败时返回 `ClientUnavailable`
    pub fn new(timeout: Duration) -> Result<Self, ForwardError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
            .build()
            .map_err(|e| ForwardError::ClientUnavailable(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PulseForwarder for HttpForwarder {
    async fn deliver(&self, target: &str, payload: &Value, token: Option<&str>) -> RelayResult {
        let mut request = self.client.post(target).json(payload);
        if let Some(token) = token {
            request = request.header(PULSE_TOKEN_HEADER, token);
        }

        match request.send().await {
            Ok(response) => {
                let code = response.status().as_u16();
                match response.text().await {
                    Ok(body) => RelayResult::delivered(target, code, &body),
                    // 读取响应体失败（含超时）与传输失败同等处理
                    Err(e) => RelayResult::failed(target, ForwardError::from(e).describe()),
                }
            }
            Err(e) => RelayResult::failed(target, ForwardError::from(e).describe()),
        }
    }

    async fn probe(&self, url: &str) -> Result<u16, ForwardError> {
        let response = self.client.get(url).send().await?;
        Ok(response.status().as_u16())
    }
}
