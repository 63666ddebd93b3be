//! Cycle and next-pair endpoints

use super::AppState;
use crate::{
    core::pairing::{self, CycleProgress, NextItem},
    errors::Result,
};
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Serialize;

/// GET /api/next
///
/// Hands out the next open pair, rolling over into a new cycle when needed.
pub async fn next(State(state): State<AppState>) -> Result<Json<NextItem>> {
    pairing::next_assignment(&state.db).await.map(Json)
}

/// GET /api/cycle
pub async fn cycle(State(state): State<AppState>) -> Result<Json<CycleProgress>> {
    pairing::cycle_progress(&state.db).await.map(Json)
}

/// Tokens written by a manual cycle reset.
#[derive(Debug, Serialize)]
pub struct CycleResetResponse {
    /// Tokens in the new cycle
    pub tokens_created: usize,
}

/// POST /api/cycle/reset
pub async fn reset(State(state): State<AppState>) -> Result<Json<CycleResetResponse>> {
    let tokens_created = pairing::reset_cycle(&state.db).await?;
    Ok(Json(CycleResetResponse { tokens_created }))
}

/// Build pairing routes
pub fn pairing_routes() -> Router<AppState> {
    Router::new()
        .route("/api/next", get(next))
        .route("/api/cycle", get(cycle))
        .route("/api/cycle/reset", post(reset))
}
