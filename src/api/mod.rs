//! HTTP API for the audit app.
//!
//! Thin axum handlers over [`crate::core`]; every handler returns JSON and maps
//! [`crate::errors::Error`] to a status code in [`error`].

pub mod admin;
pub mod audits;
pub mod catalog;
pub mod dashboard;
pub mod error;
pub mod form;
pub mod health;
pub mod pairing;
pub mod photos;

use crate::{config::Settings, core::photo::LocalPhotoStore};
use axum::{Router, extract::DefaultBodyLimit};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Largest request body accepted; phone photos are the big ones.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: DatabaseConnection,
    /// Where audit photos live
    pub photos: LocalPhotoStore,
    /// Runtime settings
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Creates state from its parts.
    pub fn new(db: DatabaseConnection, photos: LocalPhotoStore, settings: Settings) -> Self {
        Self {
            db,
            photos,
            settings: Arc::new(settings),
        }
    }
}

/// Builds the full router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(health::health_routes())
        .merge(pairing::pairing_routes())
        .merge(audits::audit_routes())
        .merge(dashboard::dashboard_routes())
        .merge(catalog::catalog_routes())
        .merge(admin::admin_routes())
        .merge(photos::photo_routes())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
