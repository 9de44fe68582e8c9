//! Storage API Handlers
//!
//! Blob status, download and upload endpoints.

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use gantry_core::domain::StorageReference;
use gantry_core::dto::storage::UPLOAD_FIELD;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::service::StorageService;

/// GET /{id}/status
/// Reference to a stored blob
pub async fn get_status(
    State(service): State<Arc<StorageService>>,
    Path(id): Path<String>,
) -> ApiResult<Json<StorageReference>> {
    tracing::debug!("Getting blob status: {}", id);

    let reference = service.status(&id).await?;
    Ok(Json(reference))
}

/// GET /{id}
/// Raw blob contents
pub async fn download(
    State(service): State<Arc<StorageService>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    tracing::debug!("Downloading blob: {}", id);

    let data = service.read(&id).await?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], data))
}

/// POST /{id}
/// Store a blob sent as the `uploadfile` multipart field
pub async fn upload(
    State(service): State<Arc<StorageService>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<StorageReference>)> {
    tracing::info!("Uploading blob: {}", id);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        let reference = service.upload(&id, filename.as_deref(), &data).await?;
        return Ok((StatusCode::CREATED, Json(reference)));
    }

    Err(ApiError::BadRequest(format!(
        "missing multipart field '{}'",
        UPLOAD_FIELD
    )))
}
