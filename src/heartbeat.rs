//! 后台心跳模块
//!
//! 按随机间隔向所有转发目标发送带时间戳的心跳负载，防止下游服务休眠

use crate::config::types::DEFAULT_MIN_INTERVAL;
use crate::config::RelayConfig;
use crate::relay::PulseForwarder;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, info_span, warn, Instrument};

/// 心跳负载中的来源标识
pub const HEARTBEAT_SOURCE: &str = "breathe";

/// 构建心跳负载
pub fn heartbeat_payload(now: DateTime<Utc>) -> Value {
    json!({
        "source": HEARTBEAT_SOURCE,
        "timestamp": now.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
    })
}

/// 在 `[min, max]` 秒内均匀抽取等待时间
///
/// 无法表示为 `Duration` 的结果回退到默认最小间隔。
pub fn random_wait(min_secs: f64, max_secs: f64) -> Duration {
    let secs = if min_secs < max_secs && (max_secs - min_secs).is_finite() {
        rand::thread_rng().gen_range(min_secs..=max_secs)
    } else {
        min_secs
    };
    Duration::try_from_secs_f64(secs)
        .unwrap_or_else(|_| Duration::from_secs_f64(DEFAULT_MIN_INTERVAL))
}

/// 心跳循环
pub struct HeartbeatLoop {
    /// 只读配置
    config: Arc<RelayConfig>,
    /// 转发器，HTTP客户端不可用时为空
    forwarder: Option<Arc<dyn PulseForwarder>>,
}

impl HeartbeatLoop {
    /// 创建新的心跳循环
    pub fn new(config: Arc<RelayConfig>, forwarder: Option<Arc<dyn PulseForwarder>>) -> Self {
        Self { config, forwarder }
    }

    /// 按配置启动心跳任务
    ///
    /// 心跳未启用时返回 `None`。
    pub fn start(self, shutdown_rx: broadcast::Receiver<()>) -> Option<JoinHandle<()>> {
        if !self.config.auto_ping {
            info!("auto_ping: 已禁用 (设置 AUTO_PING=true 以启用)");
            return None;
        }
        Some(tokio::spawn(self.run(shutdown_rx)))
    }

    /// 运行心跳循环，直到收到关闭信号
    ///
    /// 发送端被丢弃同样视为关闭。
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let Some(forwarder) = self.forwarder else {
            warn!("auto_ping: HTTP客户端不可用，心跳已禁用");
            return;
        };
        let config = self.config;

        info!(
            "auto_ping: 启动心跳 -> {} 个目标，间隔 {}-{}s（随机）",
            config.forward_urls.len(),
            config.min_interval,
            config.max_interval
        );

        loop {
            let wait = random_wait(config.min_interval, config.max_interval);
            info!("auto_ping: 等待 {:.2}s", wait.as_secs_f64());

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown_rx.recv() => {
                    info!("auto_ping: 收到关闭信号，心跳停止");
                    return;
                }
            }

            let payload = heartbeat_payload(Utc::now());
            forwarder
                .relay(
                    &payload,
                    &config.forward_urls,
                    config.forward_token.as_deref(),
                    config.inter_target_delay(),
                )
                .instrument(info_span!("auto_ping"))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigSource;
    use crate::error::ForwardError;
    use crate::relay::RelayResult;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use tokio::sync::mpsc;

    /// 将每次投递转发到通道的转发器
    struct ChannelForwarder {
        tx: mpsc::UnboundedSender<(String, Value, Option<String>)>,
    }

    #[async_trait]
    impl PulseForwarder for ChannelForwarder {
        async fn deliver(&self, target: &str, payload: &Value, token: Option<&str>) -> RelayResult {
            let _ = self
                .tx
                .send((target.to_string(), payload.clone(), token.map(str::to_string)));
            RelayResult::delivered(target, 200, "")
        }

        async fn probe(&self, _url: &str) -> Result<u16, ForwardError> {
            Ok(200)
        }
    }

    fn fast_config(auto_ping: &str) -> Arc<RelayConfig> {
        let source: ConfigSource = [
            ("FORWARD_URLS", "https://a.example.com,https://b.example.com"),
            ("FORWARD_TOKEN", "tok"),
            ("AUTO_PING", auto_ping),
            ("MIN_INTERVAL", "0.02"),
            ("MAX_INTERVAL", "0.05"),
            ("PER_TARGET_DELAY", "0"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Arc::new(RelayConfig::from_source(&source))
    }

    #[test]
    fn test_heartbeat_payload_format() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            heartbeat_payload(now),
            json!({"source": "breathe", "timestamp": "2024-01-02T03:04:05Z"})
        );
    }

    #[test]
    fn test_random_wait_within_range() {
        for _ in 0..200 {
            let wait = random_wait(15.0, 49.0);
            assert!(wait >= Duration::from_secs(15));
            assert!(wait <= Duration::from_secs(49));
        }
        assert_eq!(random_wait(2.0, 2.0), Duration::from_secs(2));
    }

    #[test]
    fn test_random_wait_out_of_range_uses_default() {
        let fallback = Duration::from_secs(15);
        assert_eq!(random_wait(1e20, 1e21), fallback);
        assert_eq!(random_wait(f64::NAN, 10.0), fallback);
        assert_eq!(random_wait(-f64::MAX, f64::MAX), fallback);
    }

    #[tokio::test]
    async fn test_heartbeat_relays_to_all_targets_until_shutdown() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let forwarder: Arc<dyn PulseForwarder> = Arc::new(ChannelForwarder { tx });
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = HeartbeatLoop::new(fast_config("true"), Some(forwarder))
            .start(shutdown_rx)
            .expect("heartbeat should be enabled");

        let mut seen = Vec::new();
        for _ in 0..4 {
            let delivery = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("heartbeat should fire")
                .expect("channel open");
            seen.push(delivery);
        }

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("heartbeat should stop")
            .unwrap();

        assert_eq!(seen[0].0, "https://a.example.com/pulse_receiver");
        assert_eq!(seen[1].0, "https://b.example.com/pulse_receiver");
        assert_eq!(seen[2].0, "https://a.example.com/pulse_receiver");
        for (_, payload, token) in &seen {
            assert_eq!(payload["source"], "breathe");
            assert!(payload["timestamp"].as_str().unwrap().ends_with('Z'));
            assert_eq!(token.as_deref(), Some("tok"));
        }
    }

    #[tokio::test]
    async fn test_disabled_heartbeat_is_not_started() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let forwarder: Arc<dyn PulseForwarder> = Arc::new(ChannelForwarder { tx });
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = HeartbeatLoop::new(fast_config("false"), Some(forwarder)).start(shutdown_rx);
        assert!(handle.is_none());
    }

    #[tokio::test]
    async fn test_missing_client_exits_immediately() {
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        tokio::time::timeout(
            Duration::from_secs(1),
            HeartbeatLoop::new(fast_config("true"), None).run(shutdown_rx),
        )
        .await
        .expect("loop should return without a client");
    }
}
