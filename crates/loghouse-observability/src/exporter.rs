//! `/metrics` exporter for the loghouse registry.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus::{Encoder, TextEncoder, TEXT_FORMAT};

use crate::metrics::REGISTRY;

/// Encode every metric registered with [`REGISTRY`] in the text exposition
/// format.
pub fn encode_registry() -> prometheus::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(buffer)
}

/// `GET /metrics`
pub async fn metrics_handler() -> Response {
    match encode_registry() {
        Ok(body) => ([(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode loghouse metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("loghouse metrics unavailable: {e}"),
            )
                .into_response()
        }
    }
}

/// Router serving `GET /metrics`. Merge it into the application router.
pub fn create_metrics_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/metrics", get(metrics_handler))
}
