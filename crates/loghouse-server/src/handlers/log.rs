//! Log append endpoint

use axum::{extract::State, Json};

use crate::error::ApiError;
use crate::models::{LogRequest, LogResponse};
use crate::validation::validate_log_request;
use crate::AppState;

/// `POST /api/logData`
pub async fn log_data(
    State(state): State<AppState>,
    Json(request): Json<LogRequest>,
) -> Result<Json<LogResponse>, ApiError> {
    tracing::debug!(request_id = %request.request_id, "Log request received");

    let validated = validate_log_request(&request).map_err(ApiError::Validation)?;

    let receipt = state
        .service
        .submit(validated.request_id, validated.data, validated.nested_path)
        .await
        .map_err(|error| ApiError::Storage {
            error,
            expose_details: state.config.expose_error_details,
        })?;

    Ok(Json(LogResponse {
        success: true,
        message: "Log data added successfully".to_string(),
        path: receipt.destination.display().to_string(),
    }))
}
