//! 命令处理逻辑
//!
//! 实现 `--once` 单次模式：不启动服务器，执行一次探测或转发后以退出码结束

use crate::cli::args::OnceMode;
use crate::config::RelayConfig;
use crate::relay::PulseForwarder;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 成功
pub const EXIT_SUCCESS: i32 = 0;
/// HTTP客户端不可用
pub const EXIT_NO_CLIENT: i32 = 1;
/// 网络请求失败
pub const EXIT_TRANSPORT_FAILURE: i32 = 2;

/// 单次命令
pub struct OnceCommand {
    /// 只读配置
    config: Arc<RelayConfig>,
    /// 转发器，HTTP客户端不可用时为空
    forwarder: Option<Arc<dyn PulseForwarder>>,
}

impl OnceCommand {
    /// 创建单次命令
    pub fn new(config: Arc<RelayConfig>, forwarder: Option<Arc<dyn PulseForwarder>>) -> Self {
        Self { config, forwarder }
    }

    /// 执行命令并返回进程退出码
    pub async fn execute(&self, mode: OnceMode) -> i32 {
        let Some(forwarder) = self.forwarder.as_deref() else {
            error!("HTTP客户端不可用，无法执行单次{}", mode);
            return EXIT_NO_CLIENT;
        };

        match mode {
            OnceMode::Probe => self.probe(forwarder).await,
            OnceMode::Relay => self.relay(forwarder).await,
        }
    }

    async fn probe(&self, forwarder: &dyn PulseForwarder) -> i32 {
        let url = &self.config.target_url;
        match forwarder.probe(url).await {
            Ok(code) => {
                info!("单次探测 {} -> {}", url, code);
                EXIT_SUCCESS
            }
            Err(e) => {
                error!("单次探测 {} 失败: {}", url, e.describe());
                EXIT_TRANSPORT_FAILURE
            }
        }
    }

    async fn relay(&self, forwarder: &dyn PulseForwarder) -> i32 {
        let payload = json!({"message": "ping"});
        let results = forwarder
            .relay(
                &payload,
                &self.config.forward_urls,
                self.config.forward_token.as_deref(),
                self.config.inter_target_delay(),
            )
            .await;

        let delivered = results.iter().filter(|r| r.is_delivered()).count();
        info!("单次转发完成: {}/{} 个目标有响应", delivered, results.len());

        if delivered > 0 {
            EXIT_SUCCESS
        } else {
            warn!("所有目标均未响应");
            EXIT_TRANSPORT_FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigSource;
    use crate::relay::{HttpForwarder, DEFAULT_REQUEST_TIMEOUT};

    fn config_with(pairs: &[(&str, &str)]) -> Arc<RelayConfig> {
        let source: ConfigSource = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Arc::new(RelayConfig::from_source(&source))
    }

    fn http_forwarder() -> Option<Arc<dyn PulseForwarder>> {
        Some(Arc::new(HttpForwarder::new(DEFAULT_REQUEST_TIMEOUT).unwrap()))
    }

    #[tokio::test]
    async fn test_probe_success_on_any_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/pulse_receiver")
            .with_status(503)
            .create_async()
            .await;

        let url = format!("{}/pulse_receiver", server.url());
        let command = OnceCommand::new(
            config_with(&[("TARGET_URL", url.as_str())]),
            http_forwarder(),
        );

        assert_eq!(command.execute(OnceMode::Probe).await, EXIT_SUCCESS);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_probe_transport_failure() {
        let command = OnceCommand::new(
            config_with(&[("TARGET_URL", "http://127.0.0.1:1/pulse_receiver")]),
            http_forwarder(),
        );
        assert_eq!(
            command.execute(OnceMode::Probe).await,
            EXIT_TRANSPORT_FAILURE
        );
    }

    #[tokio::test]
    async fn test_missing_client() {
        let command = OnceCommand::new(config_with(&[]), None);
        assert_eq!(command.execute(OnceMode::Probe).await, EXIT_NO_CLIENT);
        assert_eq!(command.execute(OnceMode::Relay).await, EXIT_NO_CLIENT);
    }

    #[tokio::test]
    async fn test_relay_succeeds_when_one_target_responds() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/pulse_receiver")
            .match_body(mockito::Matcher::Json(json!({"message": "ping"})))
            .with_status(200)
            .create_async()
            .await;

        let targets = format!("http://127.0.0.1:1,{}", server.url());
        let command = OnceCommand::new(
            config_with(&[("FORWARD_URLS", targets.as_str()), ("PER_TARGET_DELAY", "0")]),
            http_forwarder(),
        );

        assert_eq!(command.execute(OnceMode::Relay).await, EXIT_SUCCESS);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_relay_fails_when_no_target_responds() {
        let command = OnceCommand::new(
            config_with(&[
                ("FORWARD_URLS", "http://127.0.0.1:1,http://127.0.0.1:2"),
                ("PER_TARGET_DELAY", "0"),
            ]),
            http_forwarder(),
        );
        assert_eq!(
            command.execute(OnceMode::Relay).await,
            EXIT_TRANSPORT_FAILURE
        );
    }
}
