//! API Module
//!
//! HTTP API layer for the storage service. Blob routes are mounted under
//! the fixed storage prefix.

pub mod error;
pub mod storage;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::get,
};
use gantry_core::dto::storage::STORAGE_PATH_PREFIX;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::service::StorageService;

/// Create the storage router
pub fn create_router(service: Arc<StorageService>, max_upload_bytes: usize) -> Router {
    let blobs = Router::new()
        .route("/{id}/status", get(storage::get_status))
        .route("/{id}", get(storage::download).post(storage::upload));

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest(STORAGE_PATH_PREFIX, blobs)
        // Add state and middleware
        .with_state(service)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}
