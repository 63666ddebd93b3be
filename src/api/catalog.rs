//! Catalog import and export endpoints

use super::AppState;
use crate::{
    config::catalog::Catalog,
    core::catalog::{self, ImportSummary, TabularDocument},
    errors::Result,
};
use axum::{
    Json, Router,
    extract::State,
    routing::get,
};

/// POST /api/catalog
///
/// Replaces the whole catalog. All audits, tokens and photos are discarded and a new
/// cycle starts.
pub async fn import(
    State(state): State<AppState>,
    Json(document): Json<TabularDocument>,
) -> Result<Json<ImportSummary>> {
    let parsed = Catalog::try_from(&document)?;
    catalog::replace_catalog(&state.db, &state.photos, &parsed)
        .await
        .map(Json)
}

/// GET /api/catalog
pub async fn export(State(state): State<AppState>) -> Result<Json<TabularDocument>> {
    catalog::export_document(&state.db).await.map(Json)
}

/// Build catalog routes
pub fn catalog_routes() -> Router<AppState> {
    Router::new().route("/api/catalog", get(export).post(import))
}
