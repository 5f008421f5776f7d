//! Server Implementation
//!
//! HTTP 服务器启动和管理

use std::net::SocketAddr;
use std::time::Duration;

use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::core::{Config, ServerState};
use crate::utils::{AppError, AppResult};

/// HTTP Server
pub struct Server {
    config: Config,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn run(&self) -> AppResult<()> {
        // Initialize state and the realtime layer
        let (state, socket_layer) = ServerState::initialize(&self.config).await;

        // 请求级超时在传输层兜底；超时的实时推送只会被丢弃，不重试
        let request_timeout = Duration::from_millis(self.config.request_timeout_ms);
        let app = api::router()
            .with_state(state.clone())
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CorsLayer::permissive())
                    .layer(TimeoutLayer::new(request_timeout))
                    .layer(socket_layer),
            );

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        tracing::info!("🦤 Pelican Dispatch Server starting on {}", addr);
        tracing::info!(
            "  REST API      : http://localhost:{}/api",
            self.config.http_port
        );
        tracing::info!(
            "  Realtime      : ws://localhost:{}/socket.io",
            self.config.http_port
        );

        // Graceful shutdown on ctrl-c
        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        let shutdown_timeout = Duration::from_millis(self.config.shutdown_timeout_ms);
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down...");
            shutdown_handle.graceful_shutdown(Some(shutdown_timeout));
        });

        axum_server::bind(addr)
            .handle(handle)
            .serve(app.into_make_service())
            .await
            .map_err(|e| AppError::internal(format!("Server error: {}", e)))
    }
}
