//! Server and HTTP error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use loghouse_storage::Error as StorageError;

use crate::models::FieldError;

/// Startup and runtime errors of the server process.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error returned by HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    /// Request failed boundary validation
    Validation(Vec<FieldError>),
    /// Append task ended in a terminal failure
    Storage {
        error: StorageError,
        expose_details: bool,
    },
}

#[derive(Debug, Serialize)]
struct ValidationBody {
    errors: Vec<FieldError>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// HTTP status for a terminal storage error.
pub fn status_for(error: &StorageError) -> StatusCode {
    match error {
        StorageError::PathEscape { .. } | StorageError::InvalidIdentifier(_) => {
            StatusCode::BAD_REQUEST
        }
        StorageError::FileSizeExceeded { .. } => StatusCode::INSUFFICIENT_STORAGE,
        StorageError::StorageUnavailable(_)
        | StorageError::QueueClosed
        | StorageError::QueueFull { .. } => StatusCode::SERVICE_UNAVAILABLE,
        StorageError::TaskTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        StorageError::TransientIo { .. } | StorageError::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, Json(ValidationBody { errors })).into_response()
            }
            ApiError::Storage {
                error,
                expose_details,
            } => {
                let status = status_for(&error);
                let message = if status.is_server_error() && !expose_details {
                    "Internal Server Error".to_string()
                } else {
                    error.to_string()
                };
                (status, Json(ErrorBody { error: message })).into_response()
            }
        }
    }
}
