//! HTTP routes for the verification server

pub mod analyze;
pub mod health;
pub mod history;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};

use crate::server::state::AppState;

/// Caller-supplied user identifier
pub const USER_ID_HEADER: &str = "user-id";
/// Optional caller e-mail stored on the user row
pub const USER_EMAIL_HEADER: &str = "user-email";

/// Build all routes
pub fn routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health::health_check))
        // Multipart uploads get their own body limit
        .route(
            "/analyze-documents",
            post(analyze::analyze_documents).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/api/history/:user_id", get(history::get_history))
}

/// Non-empty, trimmed header value
pub(crate) fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// GET / - Service metadata
async fn service_info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "docverify",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Cross-document verification with an LLM, with per-user history",
        "endpoints": {
            "POST /analyze-documents": "Upload documents (multipart) and get a verification report",
            "GET /api/history/:user_id": "Past validations for a user, newest first",
            "GET /health": "Database connectivity and provider status"
        },
        "headers": {
            "user-id": "Caller identifier (defaults to a guest user)",
            "user-email": "Optional e-mail stored with the user"
        }
    }))
}
