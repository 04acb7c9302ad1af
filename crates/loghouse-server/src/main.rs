//! Loghouse Server
//!
//! Accepts log lines over HTTP and appends them to per-request files on
//! local disk.
//!
//! ## Configuration
//! All configuration is done via environment variables.
//!
//! ### Server Settings
//! - `LOGHOUSE_ADDR`: Bind address (default: 0.0.0.0:3000)
//! - `PORT`: Port on 0.0.0.0 when `LOGHOUSE_ADDR` is unset
//! - `LOGHOUSE_BODY_LIMIT`: Maximum request body in bytes (default: 10240)
//! - `LOGHOUSE_ENV`: Set to `production` to hide 5xx error details
//! - `SHUTDOWN_TIMEOUT_SECS`: Queue drain timeout on shutdown (default: 30)
//!
//! ### Storage Settings
//! - `STORAGE_PATHS`: Comma-separated candidate roots (default: api-logs)
//! - `DEFAULT_STORAGE_PATH`: Fallback root (default: api-logs)
//! - `LOGHOUSE_MIN_FREE_BYTES`: Free space a root needs to be selected (default: 100MB)
//! - `LOGHOUSE_MAX_FILE_BYTES`: Per-file size ceiling (default: 10MB)
//!
//! ## Logging
//! Logging is controlled via the `RUST_LOG` environment variable:
//! ```bash
//! RUST_LOG=debug cargo run -p loghouse-server    # Detailed logs
//! RUST_LOG=info cargo run -p loghouse-server     # Standard logs (default)
//! ```

use loghouse_server::ServerConfig;
use loghouse_storage::IngestConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    loghouse_observability::init_metrics();

    let server_config = ServerConfig::from_env()?;
    let ingest_config = IngestConfig::from_env()?;

    tracing::info!("Starting loghouse server");
    loghouse_server::run(server_config, ingest_config).await?;

    Ok(())
}
