//! Graceful Shutdown
//!
//! On SIGINT or SIGTERM the server stops accepting connections, drains the
//! ingest queue, then waits for in-flight requests to finish.
//!
//! ## Ordering
//!
//! ```text
//! signal received
//!      │
//!      ▼
//! LogService::shutdown()      running task completes, pending tasks fail
//!      │                      with QueueClosed (handlers answer 503)
//!      ▼
//! axum drains connections     every handler already has its result
//! ```
//!
//! The queue drain is bounded by `SHUTDOWN_TIMEOUT_SECS`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use loghouse_storage::LogService;

use crate::error::ServerError;

/// Shutdown signal type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Received SIGINT (Ctrl+C)
    SigInt,
    /// Received SIGTERM
    SigTerm,
    /// Manual shutdown requested
    Manual,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SigInt => write!(f, "SIGINT (Ctrl+C)"),
            Self::SigTerm => write!(f, "SIGTERM"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// Completes when the process receives SIGINT or SIGTERM.
///
/// A handler that cannot be installed is logged and never fires.
pub async fn shutdown_signal() -> ShutdownSignal {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        ShutdownSignal::SigInt
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
        ShutdownSignal::SigTerm
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<ShutdownSignal>();

    tokio::select! {
        signal = ctrl_c => signal,
        signal = terminate => signal,
    }
}

/// Serve `router` on `listener` until `signal` completes, then drain
/// `service` and the open connections.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    router: Router,
    service: Arc<LogService>,
    timeout: Duration,
    signal: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ShutdownSignal> + Send + 'static,
{
    let shutdown_future = async move {
        let signal = signal.await;
        tracing::info!(%signal, "Initiating graceful shutdown");

        if tokio::time::timeout(timeout, service.shutdown()).await.is_err() {
            tracing::warn!(
                timeout_secs = timeout.as_secs(),
                "Ingest queue did not drain before the shutdown timeout"
            );
        }
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_future)
        .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}
