//! Document analysis endpoint

use axum::{
    extract::{multipart::Field, Multipart, State},
    http::HeaderMap,
    Json,
};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::processing::{AnalysisRequest, DocumentUpload};
use crate::server::routes::{header_value, USER_EMAIL_HEADER, USER_ID_HEADER};
use crate::server::state::AppState;
use crate::types::VerificationReport;

/// POST /analyze-documents - Upload documents and get a verification report
pub async fn analyze_documents(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<VerificationReport>> {
    let user_id = header_value(&headers, USER_ID_HEADER)
        .unwrap_or_else(|| state.config().analysis.guest_user_id.clone());
    let email = header_value(&headers, USER_EMAIL_HEADER);

    let mut uploads = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::validation_input(format!("Failed to read multipart field: {}", e)))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            tracing::debug!(field = ?field.name(), "skipping non-file form field");
            continue;
        };

        let mime_type = resolve_mime_type(&field, &file_name);
        let data = field.bytes().await.map_err(|e| {
            Error::validation_input(format!("Failed to read file '{}': {}", file_name, e))
        })?;

        tracing::info!(user_id = %user_id, file = %file_name, mime = %mime_type, bytes = data.len(), "received upload");
        uploads.push(DocumentUpload::new(file_name, mime_type, data));
    }

    let request = AnalysisRequest {
        user_id,
        email,
        uploads,
    };

    // Dropping this handler cancels the run; the spawned task still records the outcome
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let task = tokio::spawn({
        let state = state.clone();
        let cancel = cancel.clone();
        async move { state.pipeline().run(request, &cancel).await }
    });

    let report = task
        .await
        .map_err(|e| Error::internal(format!("analysis task failed: {}", e)))??;
    Ok(Json(report))
}

/// Declared content type, or a guess from the file name when it is missing or generic
fn resolve_mime_type(field: &Field<'_>, file_name: &str) -> String {
    let declared = field
        .content_type()
        .map(essence)
        .filter(|ct| !ct.is_empty() && ct != "application/octet-stream");

    declared.unwrap_or_else(|| {
        mime_guess::from_path(file_name)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string()
    })
}

/// `Text/Plain; charset=utf-8` -> `text/plain`
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
