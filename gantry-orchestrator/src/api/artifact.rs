//! Artifact API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use gantry_core::domain::{Artifact, ObjectKey};

use crate::api::SharedStore;
use crate::api::error::ApiResult;
use crate::service::artifact_service;

/// GET /artifacts/{namespace}
pub async fn list_artifacts(
    State(store): State<SharedStore>,
    Path(namespace): Path<String>,
) -> ApiResult<Json<Vec<Artifact>>> {
    let artifacts = artifact_service::list_artifacts(store.as_ref(), &namespace).await?;
    Ok(Json(artifacts))
}

/// GET /artifacts/{namespace}/{name}
pub async fn get_artifact(
    State(store): State<SharedStore>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<Artifact>> {
    let key = ObjectKey::new(namespace, name);
    let artifact = artifact_service::get_artifact(store.as_ref(), &key).await?;
    Ok(Json(artifact))
}
