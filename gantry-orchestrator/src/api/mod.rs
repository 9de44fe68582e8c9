//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod artifact;
pub mod error;
pub mod git_source;
pub mod health;
pub mod pipeline;

use axum::{
    Router,
    routing::{get, post},
};
use gantry_store::ObjectStore;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Handler state: the object store every endpoint reads and writes
pub type SharedStore = Arc<dyn ObjectStore>;

/// Create the main API router with all endpoints
pub fn create_router(store: SharedStore) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Template endpoints
        .route("/templates", post(pipeline::create_template))
        .route("/templates/{namespace}/{name}", get(pipeline::get_template))
        // Pipeline endpoints
        .route("/pipelines", post(pipeline::create_pipeline))
        .route(
            "/pipelines/{namespace}/{name}",
            get(pipeline::get_pipeline).delete(pipeline::delete_pipeline),
        )
        .route(
            "/pipelines/{namespace}/{name}/stages",
            get(pipeline::list_stages),
        )
        // Git source endpoints
        .route("/gitsources", post(git_source::create_git_source))
        .route("/gitsources/{namespace}", get(git_source::list_git_sources))
        .route(
            "/gitsources/{namespace}/{name}",
            get(git_source::get_git_source).delete(git_source::delete_git_source),
        )
        // Artifact endpoints
        .route("/artifacts/{namespace}", get(artifact::list_artifacts))
        .route("/artifacts/{namespace}/{name}", get(artifact::get_artifact))
        // Add state and middleware
        .with_state(store)
        .layer(TraceLayer::new_for_http())
}
