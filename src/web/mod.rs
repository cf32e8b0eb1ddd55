//! Web 接口模块
//!
//! 提供状态、探测和接收转发三个 HTTP 端点

use crate::config::RelayConfig;
use crate::relay::PulseForwarder;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

pub mod handlers;
pub mod server;

pub use server::WebServer;

/// Web 服务器共享状态，启动后只读
#[derive(Clone)]
pub struct AppState {
    /// 只读配置
    pub config: Arc<RelayConfig>,
    /// 转发器，HTTP客户端不可用时为空
    pub forwarder: Option<Arc<dyn PulseForwarder>>,
    /// 启动时间
    pub start_time: Instant,
}

impl AppState {
    /// 创建新的共享状态
    pub fn new(config: Arc<RelayConfig>, forwarder: Option<Arc<dyn PulseForwarder>>) -> Self {
        Self {
            config,
            forwarder,
            start_time: Instant::now(),
        }
    }
}

/// 创建路由
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::status))
        .route("/send_wave", get(handlers::send_wave))
        .route(
            "/receive_pulse",
            post(handlers::receive_pulse).get(handlers::receive_pulse),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
