//! HTTP surface.
//!
//! - `POST /translate`: translate text between two supported languages
//! - `GET /languages`: supported languages and the route for every pair
//! - `GET /metrics`: cache and translation counters
//! - `GET /health`: liveness probe

mod handlers;

pub use handlers::{ApiError, TranslateBody, TranslateResponse};

use crate::pipeline::TranslationService;
use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TranslationService>,
    /// When set, `POST /translate` requires a matching `X-API-Key` header
    pub api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(service: Arc<TranslationService>, api_key: Option<String>) -> Self {
        Self {
            service,
            api_key: api_key.map(Arc::from),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/translate", post(handlers::translate))
        .route("/languages", get(handlers::languages))
        .route("/metrics", get(handlers::metrics))
        .route("/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C or SIGTERM.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("🚀 Listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
