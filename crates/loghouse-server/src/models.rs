//! API models for REST endpoints

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Body of `POST /api/logData`.
///
/// `level`, `tags` and `timestamp` are accepted for compatibility and not
/// stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRequest {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<LogLevel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogResponse {
    pub success: bool,
    pub message: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub msg: String,
    pub param: String,
}

impl FieldError {
    pub fn new(param: &str, msg: &str) -> Self {
        Self {
            msg: msg.to_string(),
            param: param.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub queue_depth: usize,
    pub accepting: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_uses_camel_case() {
        let request: LogRequest = serde_json::from_str(
            r#"{"requestId":"req-1","data":"hi","nestedPath":"a/b","level":"error"}"#,
        )
        .unwrap();
        assert_eq!(request.request_id, "req-1");
        assert_eq!(request.nested_path.as_deref(), Some("a/b"));
        assert_eq!(request.level, Some(LogLevel::Error));
        assert!(request.tags.is_empty());
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let request: LogRequest = serde_json::from_str("{}").unwrap();
        assert!(request.request_id.is_empty());
        assert!(request.data.is_empty());
        assert!(request.nested_path.is_none());
    }
}
