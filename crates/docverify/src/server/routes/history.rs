//! Validation history endpoint

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::ValidationRecord;

/// Response for a user's history
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub user_id: String,
    pub count: usize,
    pub validations: Vec<ValidationRecord>,
}

/// GET /api/history/:user_id - Past validations, newest first
pub async fn get_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<HistoryResponse>> {
    let limit = state.config().analysis.history_limit;
    let validations = state.db().list_validations_for_user(&user_id, limit)?;

    Ok(Json(HistoryResponse {
        user_id,
        count: validations.len(),
        validations,
    }))
}
