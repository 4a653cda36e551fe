//! Health check endpoint

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::server::state::AppState;
use crate::types::ValidationStats;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` or `unhealthy`
    pub status: &'static str,
    /// `connected` or `disconnected`
    pub database: &'static str,
    pub provider_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Job counts per status; absent when the database is down
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validations: Option<ValidationStats>,
    pub timestamp: DateTime<Utc>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let stats = state.db().ping().and_then(|_| state.db().validation_stats());

    let (status, database, validations) = match stats {
        Ok(stats) => (StatusCode::OK, "connected", Some(stats)),
        Err(e) => {
            tracing::error!(error = %e, "health check: database unreachable");
            (StatusCode::SERVICE_UNAVAILABLE, "disconnected", None)
        }
    };

    let body = HealthResponse {
        status: if status.is_success() { "healthy" } else { "unhealthy" },
        database,
        provider_configured: state.pipeline().is_configured(),
        model: state.provider().map(|llm| llm.model().to_string()),
        validations,
        timestamp: Utc::now(),
    };

    (status, Json(body))
}
