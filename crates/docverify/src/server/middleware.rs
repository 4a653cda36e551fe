//! Per-request API log

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::server::routes::{header_value, USER_ID_HEADER};
use crate::server::state::AppState;
use crate::types::ApiLogEntry;

/// Append one `api_logs` row per request; failures are only logged
pub async fn record_api_call(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let endpoint = request.uri().path().to_string();
    let method = request.method().to_string();
    // Same identity the analysis job is filed under
    let user_id = header_value(request.headers(), USER_ID_HEADER)
        .unwrap_or_else(|| state.config().analysis.guest_user_id.clone());

    let response = next.run(request).await;

    let entry = ApiLogEntry::new(
        endpoint,
        method,
        Some(user_id),
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    if let Err(e) = state.db().append_api_log(&entry) {
        tracing::warn!(
            operation = "append_api_log",
            endpoint = %entry.endpoint,
            error = %e,
            "bookkeeping failed"
        );
    }

    response
}
