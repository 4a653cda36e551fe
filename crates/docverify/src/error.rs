//! Error types for the verification service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Result type alias for verification operations
pub type Result<T> = std::result::Result<T, Error>;

/// A single schema violation found in a provider response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// JSON path of the offending field (e.g. `cross_validations[1].status`)
    pub path: String,
    /// What is wrong with it
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Verification service errors
#[derive(Debug, Error)]
pub enum Error {
    /// Bad upload (no files, too many files, unsupported type, empty file)
    #[error("Invalid input: {0}")]
    ValidationInput(String),

    /// LLM provider credentials are missing
    #[error("LLM provider not configured: {0}")]
    ProviderUnavailable(String),

    /// A remote file entered a terminal failure state, timed out, or the wait was cancelled
    #[error("Provider failed to process '{file}': {reason}")]
    ProviderProcessingFailed { file: String, reason: String },

    /// Provider call failed (transport or non-success status)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider output was not valid JSON
    #[error("Malformed provider response: {message}")]
    MalformedResponse { raw: String, message: String },

    /// Provider output did not match the report schema
    #[error("Provider response violates report schema: {}", format_violations(.0))]
    SchemaViolation(Vec<Violation>),

    /// Persistence error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create an input validation error
    pub fn validation_input(message: impl Into<String>) -> Self {
        Self::ValidationInput(message.into())
    }

    /// Create a provider processing error for a named file
    pub fn processing_failed(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProviderProcessingFailed {
            file: file.into(),
            reason: reason.into(),
        }
    }

    /// Create a provider error
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// HTTP status this error maps to
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::ValidationInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (error_type, message) = match &self {
            Error::ValidationInput(msg) => ("validation_input", msg.clone()),
            Error::ProviderUnavailable(msg) => (
                "provider_unavailable",
                format!("LLM provider not configured: {}", msg),
            ),
            Error::ProviderProcessingFailed { .. } => ("provider_processing_failed", self.to_string()),
            Error::Provider(msg) => ("provider_error", format!("Analysis failed: {}", msg)),
            // Raw provider text stays in the server logs
            Error::MalformedResponse { .. } => (
                "malformed_response",
                "Analysis failed: the provider returned a response that is not valid JSON"
                    .to_string(),
            ),
            Error::SchemaViolation(_) => ("schema_violation", self.to_string()),
            Error::Database(err) => ("database_error", err.to_string()),
            Error::Config(msg) => ("config_error", msg.clone()),
            Error::Io(err) => ("io_error", err.to_string()),
            Error::Json(err) => ("json_error", err.to_string()),
            Error::Http(err) => ("http_error", err.to_string()),
            Error::Internal(msg) => ("internal_error", msg.clone()),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::validation_input("no files").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::ProviderUnavailable("GEMINI_API_KEY is not set".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::SchemaViolation(vec![]).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::internal("analysis task panicked").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_schema_violation_names_fields() {
        let err = Error::SchemaViolation(vec![
            Violation::new("risk_level", "missing required field"),
            Violation::new("overall_confidence", "must be between 0 and 100"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("risk_level: missing required field"));
        assert!(msg.contains("overall_confidence"));
    }

    #[test]
    fn test_malformed_response_hides_raw_text() {
        let err = Error::MalformedResponse {
            raw: "SECRET RAW TEXT".into(),
            message: "expected value at line 1".into(),
        };
        assert!(!err.to_string().contains("SECRET RAW TEXT"));
    }
}
