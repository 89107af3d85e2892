//! Gateway 应用层
//!
//! HTTP 服务器、静态文件和请求处理

mod handlers;
mod middleware;
mod state;

pub use state::AppState;

use anyhow::Result;
use axum::{
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::Config;
use crate::relay::{ChatCompletionClient, Relay};

/// 服务端整体超时，需大于上游超时
const REQUEST_TIMEOUT_MARGIN_SECS: u64 = 15;

pub async fn serve(config: Config) -> Result<()> {
    let backend = ChatCompletionClient::new(&config.upstream)?;
    let relay = Relay::new(config.api_key.clone(), &config.upstream, Arc::new(backend));

    if !relay.has_api_key() {
        tracing::warn!("API_KEY is not set; /motivate will answer with an error until it is");
    }
    if !config.static_dir.is_dir() {
        tracing::warn!(
            "Static directory {} does not exist",
            config.static_dir.display()
        );
    }

    let request_timeout =
        Duration::from_secs(config.upstream.timeout_secs + REQUEST_TIMEOUT_MARGIN_SECS);
    let app = build_router(AppState::new(relay), &config.static_dir, request_timeout);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!(
        model = %config.upstream.model,
        "Starting server on http://{}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn build_router(state: AppState, static_dir: &Path, request_timeout: Duration) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::handle_health))
        .route("/motivate", post(handlers::handle_motivate));

    Router::new()
        .merge(api_routes)
        .fallback_service(ServeDir::new(static_dir))
        .layer(
            ServiceBuilder::new()
                .layer(axum_middleware::from_fn(middleware::request_logger))
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    request_timeout,
                )),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    #[cfg(not(unix))]
    tokio::select! {
        _ = ctrl_c => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
