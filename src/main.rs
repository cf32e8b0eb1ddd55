//! Pulse Relay 主程序入口
//!
//! 保活与脉冲转发服务

use anyhow::{Context, Result};
use clap::Parser;
use pulse_relay::cli::{Args, OnceCommand};
use pulse_relay::config::{ConfigLoader, EnvConfigLoader, RelayConfig};
use pulse_relay::heartbeat::HeartbeatLoop;
use pulse_relay::logging::{LogConfig, LoggingSystem};
use pulse_relay::relay::{HttpForwarder, PulseForwarder, DEFAULT_REQUEST_TIMEOUT};
use pulse_relay::web::{AppState, WebServer};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let args = Args::parse();

    // 初始化日志系统
    let log_config = LogConfig {
        level: args.log_level.clone().into(),
        json_format: args.log_json,
    };
    let logging_system = LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")?;

    info!(
        "{} v{} 启动，日志级别: {}",
        pulse_relay::APP_NAME,
        pulse_relay::VERSION,
        logging_system.config().level
    );

    let config = Arc::new(load_config(&args).await?);
    log_startup_summary(&config);

    let forwarder = build_forwarder();

    if args.once {
        let code = OnceCommand::new(config, forwarder)
            .execute(args.once_mode)
            .await;
        std::process::exit(code);
    }

    run_service(config, forwarder).await
}

/// 加载配置并应用命令行覆盖
async fn load_config(args: &Args) -> Result<RelayConfig> {
    let loader = EnvConfigLoader::new(args.config.clone());
    let mut config = loader.load().await.context("加载配置失败")?;

    if let Some(port) = args.port.filter(|p| *p != 0) {
        config.port = port;
    }
    Ok(config)
}

/// 构建HTTP转发器，客户端无法构建时返回 `None`
fn build_forwarder() -> Option<Arc<dyn PulseForwarder>> {
    match HttpForwarder::new(DEFAULT_REQUEST_TIMEOUT) {
        Ok(forwarder) => Some(Arc::new(forwarder)),
        Err(e) => {
            error!("{}，转发与心跳将不可用", e);
            None
        }
    }
}

fn log_startup_summary(config: &RelayConfig) {
    info!(
        "转发目标 ({} 个): {}",
        config.forward_urls.len(),
        config.forward_urls.join(", ")
    );
    info!(
        "探测地址: {}，心跳: {}，间隔 {}-{}s",
        config.target_url,
        if config.auto_ping { "启用" } else { "禁用" },
        config.min_interval,
        config.max_interval
    );
    match serde_json::to_string(config) {
        Ok(summary) => tracing::debug!("生效配置: {}", summary),
        Err(e) => warn!("无法序列化配置: {}", e),
    }
}

/// 运行HTTP服务与心跳，直到收到 Ctrl+C
async fn run_service(
    config: Arc<RelayConfig>,
    forwarder: Option<Arc<dyn PulseForwarder>>,
) -> Result<()> {
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // 信号处理任务
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("接收到Ctrl+C信号，开始优雅关闭...");
                let _ = signal_tx.send(());
            }
            Err(e) => error!("监听Ctrl+C信号失败: {}", e),
        }
    });

    let heartbeat = HeartbeatLoop::new(config.clone(), forwarder.clone())
        .start(shutdown_tx.subscribe());

    let server = WebServer::new(AppState::new(config, forwarder));
    let result = server.start(shutdown_tx.subscribe()).await;

    // 服务器异常退出时同样停止心跳
    let _ = shutdown_tx.send(());
    if let Some(handle) = heartbeat {
        if let Err(e) = handle.await {
            warn!("心跳任务异常结束: {}", e);
        }
    }

    result.context("Web服务器运行失败")?;
    info!("服务已停止");
    Ok(())
}
