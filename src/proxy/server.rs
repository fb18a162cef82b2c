//! # HTTP 服务器
//!
//! 单一 fallback 路由：任意路径、任意方法都交给 [`proxy_handler`]。

use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::handler::proxy_handler;
use super::state::ProxyState;
use crate::error::Result;
use crate::linfo;
use crate::logging::{LogComponent, LogStage};

/// 代理服务器
pub struct ProxyServer {
    listen: String,
    router: Router,
}

impl ProxyServer {
    #[must_use]
    pub fn new(listen: impl Into<String>, state: ProxyState) -> Self {
        Self {
            listen: listen.into(),
            router: Self::router(state),
        }
    }

    /// 构建路由
    pub fn router(state: ProxyState) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// 监听地址
    #[must_use]
    pub fn listen(&self) -> &str {
        &self.listen
    }

    /// 启动服务器，收到 Ctrl+C 后优雅退出
    pub async fn serve(self) -> Result<()> {
        let addr: SocketAddr = self.listen.parse().map_err(|e| {
            crate::error!(Config, format!("无效的监听地址 '{}': {e}", self.listen))
        })?;

        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            crate::error::ProxyError::server_start_with_source(format!("无法绑定 {addr}"), e)
        })?;

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::ServerSetup,
            "server_start",
            &format!("代理服务监听 {addr}")
        );

        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| crate::error!(Internal, format!("服务器运行错误: {e}")))?;

        linfo!(
            "system",
            LogStage::Shutdown,
            LogComponent::ServerSetup,
            "server_stop",
            "代理服务已停止"
        );
        Ok(())
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // 无法安装信号处理时一直运行
        std::future::pending::<()>().await;
    }
}
