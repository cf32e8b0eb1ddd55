//! Web服务器实现
//!
//! 提供HTTP服务器启动与优雅关闭

use super::{create_router, AppState};
use crate::error::Result;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

/// Web服务器
pub struct WebServer {
    /// 共享状态
    state: AppState,
}

impl WebServer {
    /// 创建新的Web服务器
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// 绑定配置中的监听地址并运行，直到收到关闭信号
    pub async fn start(self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let addr = self.state.config.socket_addr()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown_rx).await
    }

    /// 在已绑定的监听器上运行
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()> {
        let addr = listener.local_addr()?;
        info!("Web服务器已启动: http://{}", addr);
        info!("状态: http://{}/", addr);
        info!("接收脉冲: http://{}/receive_pulse", addr);

        axum::serve(listener, create_router(self.state))
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("接收到关闭信号，正在关闭Web服务器...");
            })
            .await?;

        info!("Web服务器已关闭");
        Ok(())
    }
}
