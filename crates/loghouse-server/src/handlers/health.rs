use axum::{extract::State, Json};

use crate::models::HealthResponse;
use crate::AppState;

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        queue_depth: state.service.queue_depth(),
        accepting: state.service.is_accepting(),
    })
}
