//! Health Check API Handler

use axum::{Json, extract::State, http::StatusCode};
use gantry_core::domain::Kind;
use serde_json::{Value, json};

use crate::api::SharedStore;
use crate::api::error::{ApiError, ApiResult};

/// GET /health
/// Reports healthy only while the object store answers
pub async fn health_check(State(store): State<SharedStore>) -> ApiResult<(StatusCode, Json<Value>)> {
    store
        .list(Kind::WorkflowTemplate, Some("default"))
        .await
        .map_err(|e| ApiError::Unavailable(format!("object store unreachable: {}", e)))?;

    Ok((StatusCode::OK, Json(json!({ "status": "ok" }))))
}
