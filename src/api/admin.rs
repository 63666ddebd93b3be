//! Administrative endpoints

use super::AppState;
use crate::{
    core::admin::{self, ResetSummary},
    errors::Result,
};
use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;

/// Body of a reset request.
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    /// Must match the configured admin passphrase
    pub passphrase: String,
}

/// POST /api/admin/reset
pub async fn reset(
    State(state): State<AppState>,
    Json(request): Json<ResetRequest>,
) -> Result<Json<ResetSummary>> {
    admin::reset_everything(
        &state.db,
        &state.photos,
        &request.passphrase,
        state.settings.admin_passphrase.as_deref(),
    )
    .await
    .map(Json)
}

/// Build admin routes
pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/api/admin/reset", post(reset))
}
