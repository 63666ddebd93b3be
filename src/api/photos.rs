//! Photo serving and diagnostics

use super::AppState;
use crate::{
    core::photo::{self, PhotoCheck},
    errors::{Error, Result},
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;

/// Audits inspected by the photo check unless a limit is given.
const DEFAULT_PHOTO_CHECK_LIMIT: u64 = 10;

fn content_type(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// GET /uploads/:file
pub async fn serve_photo(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<impl IntoResponse> {
    let reference = format!("uploads/{file_name}");
    let bytes = state
        .photos
        .read(&reference)
        .await
        .map_err(|_| Error::not_found("photo", &file_name))?
        .ok_or_else(|| Error::not_found("photo", &file_name))?;

    Ok(([(header::CONTENT_TYPE, content_type(&file_name))], bytes))
}

/// Query parameters for the photo check.
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    /// Number of most recent audits to inspect
    pub limit: Option<u64>,
}

/// GET /api/photos/verify?limit=N
pub async fn verify_photos(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Result<Json<Vec<PhotoCheck>>> {
    let limit = params.limit.unwrap_or(DEFAULT_PHOTO_CHECK_LIMIT);
    photo::verify_recent_photos(&state.db, &state.photos, limit)
        .await
        .map(Json)
}

/// Build photo routes
pub fn photo_routes() -> Router<AppState> {
    Router::new()
        .route("/uploads/:file", get(serve_photo))
        .route("/api/photos/verify", get(verify_photos))
}
