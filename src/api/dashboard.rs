//! Dashboard endpoints

use super::AppState;
use crate::{
    core::dashboard::{self, AuditMatrix, DashboardGrid},
    errors::{Error, Result},
};
use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;

/// Query parameters for the grid.
#[derive(Debug, Deserialize)]
pub struct GridParams {
    /// Column count; defaults to the configured width
    pub max_sequence: Option<usize>,
}

/// GET /api/dashboard?max_sequence=N
pub async fn grid(
    State(state): State<AppState>,
    Query(params): Query<GridParams>,
) -> Result<Json<DashboardGrid>> {
    let max_sequence = params
        .max_sequence
        .unwrap_or(state.settings.dashboard_columns);
    if max_sequence == 0 {
        return Err(Error::validation("max_sequence must be at least 1"));
    }
    dashboard::build_grid(&state.db, max_sequence).await.map(Json)
}

/// GET /api/matrix
pub async fn matrix(State(state): State<AppState>) -> Result<Json<AuditMatrix>> {
    dashboard::build_matrix(&state.db).await.map(Json)
}

/// Build dashboard routes
pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/api/dashboard", get(grid))
        .route("/api/matrix", get(matrix))
}
