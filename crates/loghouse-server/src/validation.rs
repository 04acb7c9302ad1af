//! Boundary validation for log requests.
//!
//! Runs before anything reaches the storage layer. Every violation is
//! collected so the client sees all of them in one response.

use crate::models::{FieldError, LogRequest};

pub const MAX_REQUEST_ID_CHARS: usize = 100;
pub const MAX_DATA_CHARS: usize = 1_000_000;

/// A request that passed validation, with trimmed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedLog {
    pub request_id: String,
    pub data: String,
    pub nested_path: Option<String>,
}

pub fn validate_log_request(request: &LogRequest) -> Result<ValidatedLog, Vec<FieldError>> {
    let mut errors = Vec::new();

    let request_id = request.request_id.trim();
    if request_id.is_empty() {
        errors.push(FieldError::new("requestId", "RequestId is required"));
    } else {
        if request_id.chars().count() > MAX_REQUEST_ID_CHARS {
            errors.push(FieldError::new(
                "requestId",
                "RequestId must be between 1 and 100 characters",
            ));
        }
        if !request_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            errors.push(FieldError::new(
                "requestId",
                "RequestId can only contain letters, numbers, hyphens, and underscores",
            ));
        }
    }

    let data = request.data.trim();
    if data.is_empty() {
        errors.push(FieldError::new("data", "Data is required"));
    } else if data.chars().count() > MAX_DATA_CHARS {
        errors.push(FieldError::new("data", "Data exceeds maximum length"));
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let nested_path = request
        .nested_path
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    Ok(ValidatedLog {
        request_id: request_id.to_string(),
        data: data.to_string(),
        nested_path,
    })
}
