//! HTTP endpoint exposing Prometheus metrics.

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use relay_metrics::{RelayMetrics, TEXT_CONTENT_TYPE};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Running `/metrics` + `/health` server.
pub struct MetricsServer {
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

fn router(metrics: Arc<RelayMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<Arc<RelayMetrics>>) -> Response {
    match metrics.render() {
        Ok(body) => ([(CONTENT_TYPE, TEXT_CONTENT_TYPE)], body).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to gather metrics: {}", e),
        )
            .into_response(),
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

impl MetricsServer {
    /// Bind `addr` and serve in a background task.
    pub async fn start(addr: SocketAddr, metrics: Arc<RelayMetrics>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router(metrics))
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!(error = %e, "Metrics server error");
            }
        });

        info!(addr = %local_addr, "Metrics server listening");
        Ok(Self {
            local_addr,
            shutdown_tx,
            handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for the server task.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.handle.await {
            error!(error = %e, "Metrics server task failed");
        }
        info!("Metrics server stopped");
    }
}
