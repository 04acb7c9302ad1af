//! Loghouse HTTP Server
//!
//! Thin HTTP boundary over [`loghouse_storage::LogService`]:
//!
//! - `POST /api/logData`: validate, submit, answer with the file written
//! - `GET /health`: queue depth and whether the queue is accepting
//! - `GET /metrics`: Prometheus text format
//!
//! Handlers never touch the filesystem. Every append goes through the
//! single-worker ingest queue.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use loghouse_observability::exporter::create_metrics_router;
use loghouse_storage::{IngestConfig, LogService};

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod shutdown;
pub mod validation;

pub use config::ServerConfig;
pub use error::{ApiError, ServerError};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LogService>,
    pub config: Arc<ServerConfig>,
}

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.body_limit_bytes;

    Router::new()
        .route("/api/logData", post(handlers::log::log_data))
        .route("/health", get(handlers::health::health))
        .with_state(state)
        .merge(create_metrics_router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
}

/// Initialize storage, start the ingest queue, and serve until SIGINT or
/// SIGTERM.
pub async fn run(server_config: ServerConfig, ingest_config: IngestConfig) -> Result<(), ServerError> {
    let service = Arc::new(LogService::new(ingest_config)?);
    service.initialize_storage_roots().await?;
    service.start()?;

    let roots: Vec<String> = service
        .config()
        .storage_roots
        .iter()
        .map(|root| root.display().to_string())
        .collect();
    tracing::info!(
        roots = ?roots,
        default_root = %service.config().default_root.display(),
        "Ingest queue started"
    );

    let state = AppState {
        service: Arc::clone(&service),
        config: Arc::new(server_config.clone()),
    };
    let router = create_router(state);

    let listener = TcpListener::bind(server_config.bind_addr).await?;
    tracing::info!(
        addr = %server_config.bind_addr,
        shutdown_timeout_secs = server_config.shutdown_timeout.as_secs(),
        "HTTP server listening"
    );

    shutdown::serve_with_shutdown(
        listener,
        router,
        service,
        server_config.shutdown_timeout,
        shutdown::shutdown_signal(),
    )
    .await
}
