//! Pipeline API Handlers
//!
//! HTTP endpoints for templates and pipeline runs.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use gantry_core::domain::{ObjectKey, Pipeline, WorkflowTemplate};
use gantry_core::dto::pipeline::{CreatePipeline, CreateTemplate, StageSummary};

use crate::api::SharedStore;
use crate::api::error::ApiResult;
use crate::service::pipeline_service;

/// POST /templates
/// Register a workflow template
pub async fn create_template(
    State(store): State<SharedStore>,
    Json(req): Json<CreateTemplate>,
) -> ApiResult<(StatusCode, Json<WorkflowTemplate>)> {
    tracing::info!("Creating workflow template: {}/{}", req.namespace, req.name);

    let template = pipeline_service::create_template(store.as_ref(), req).await?;

    Ok((StatusCode::CREATED, Json(template)))
}

/// GET /templates/{namespace}/{name}
pub async fn get_template(
    State(store): State<SharedStore>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<WorkflowTemplate>> {
    let key = ObjectKey::new(namespace, name);
    tracing::debug!("Getting workflow template: {}", key);

    let template = pipeline_service::get_template(store.as_ref(), &key).await?;

    Ok(Json(template))
}

/// POST /pipelines
/// Start a pipeline run
pub async fn create_pipeline(
    State(store): State<SharedStore>,
    Json(req): Json<CreatePipeline>,
) -> ApiResult<(StatusCode, Json<Pipeline>)> {
    tracing::info!("Creating pipeline: {}/{}", req.namespace, req.name);

    let pipeline = pipeline_service::create_pipeline(store.as_ref(), req).await?;

    Ok((StatusCode::CREATED, Json(pipeline)))
}

/// GET /pipelines/{namespace}/{name}
pub async fn get_pipeline(
    State(store): State<SharedStore>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<Pipeline>> {
    let key = ObjectKey::new(namespace, name);
    tracing::debug!("Getting pipeline: {}", key);

    let pipeline = pipeline_service::get_pipeline(store.as_ref(), &key).await?;

    Ok(Json(pipeline))
}

/// GET /pipelines/{namespace}/{name}/stages
pub async fn list_stages(
    State(store): State<SharedStore>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<Vec<StageSummary>>> {
    let key = ObjectKey::new(namespace, name);

    let stages = pipeline_service::list_stages(store.as_ref(), &key).await?;

    Ok(Json(stages))
}

/// DELETE /pipelines/{namespace}/{name}
/// Delete a pipeline together with its stages, tasks, jobs and artifacts
pub async fn delete_pipeline(
    State(store): State<SharedStore>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let key = ObjectKey::new(namespace, name);
    tracing::info!("Deleting pipeline: {}", key);

    pipeline_service::delete_pipeline(store.as_ref(), &key).await?;

    Ok(StatusCode::NO_CONTENT)
}
