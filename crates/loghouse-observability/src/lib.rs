//! Loghouse Observability
//!
//! Prometheus metrics for the ingest path and an axum exporter.
//!
//! # Usage
//!
//! ```no_run
//! use loghouse_observability::{exporter, metrics};
//!
//! // Register metrics once at startup
//! metrics::init();
//!
//! // Serve them on GET /metrics
//! let metrics_router: axum::Router = exporter::create_metrics_router();
//! ```

pub mod exporter;
pub mod metrics;

pub use metrics::{init as init_metrics, REGISTRY};
