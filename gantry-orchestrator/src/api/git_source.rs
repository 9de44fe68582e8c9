//! Git Source API Handlers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use gantry_core::domain::{GitSource, ObjectKey};
use gantry_core::dto::pipeline::CreateGitSource;

use crate::api::SharedStore;
use crate::api::error::ApiResult;
use crate::service::git_source_service;

/// POST /gitsources
/// Start watching a branch for new commits
pub async fn create_git_source(
    State(store): State<SharedStore>,
    Json(req): Json<CreateGitSource>,
) -> ApiResult<(StatusCode, Json<GitSource>)> {
    tracing::info!("Creating git source: {}/{}", req.namespace, req.name);

    let source = git_source_service::create_git_source(store.as_ref(), req).await?;

    Ok((StatusCode::CREATED, Json(source)))
}

/// GET /gitsources/{namespace}
pub async fn list_git_sources(
    State(store): State<SharedStore>,
    Path(namespace): Path<String>,
) -> ApiResult<Json<Vec<GitSource>>> {
    let sources = git_source_service::list_git_sources(store.as_ref(), &namespace).await?;
    Ok(Json(sources))
}

/// GET /gitsources/{namespace}/{name}
pub async fn get_git_source(
    State(store): State<SharedStore>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<GitSource>> {
    let key = ObjectKey::new(namespace, name);
    tracing::debug!("Getting git source: {}", key);

    let source = git_source_service::get_git_source(store.as_ref(), &key).await?;

    Ok(Json(source))
}

/// DELETE /gitsources/{namespace}/{name}
/// Stop watching and delete every pipeline the source started
pub async fn delete_git_source(
    State(store): State<SharedStore>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let key = ObjectKey::new(namespace, name);
    tracing::info!("Deleting git source: {}", key);

    git_source_service::delete_git_source(store.as_ref(), &key).await?;

    Ok(StatusCode::NO_CONTENT)
}
