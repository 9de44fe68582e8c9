//! Storage service endpoints

use gantry_core::domain::StorageReference;
use gantry_core::dto::storage::{UPLOAD_FIELD, archive_filename};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};

use crate::StorageClient;
use crate::error::{ClientError, Result};

impl StorageClient {
    /// Check that the service is up
    pub async fn health(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }

    /// Look up a blob
    ///
    /// # Returns
    /// The stored reference, or `None` when the service answers `404`. Any
    /// other status besides `200` is an error.
    pub async fn status(&self, id: &str) -> Result<Option<StorageReference>> {
        let url = self.blob_url(id, Some("status"))?;
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        self.handle_response(response, StatusCode::OK).await.map(Some)
    }

    /// Download a blob's bytes, or `None` when it does not exist
    pub async fn download(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let url = self.blob_url(id, None)?;
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::OK => Ok(Some(response.bytes().await?.to_vec())),
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                Err(ClientError::api_error(status.as_u16(), error_text))
            }
        }
    }

    /// Upload an archive under `id`
    ///
    /// The archive is sent as the `uploadfile` multipart field named
    /// `{id}.tar.gz`. Anything but `201 Created` is a failure carrying the
    /// response body.
    pub async fn upload(&self, id: &str, archive: Vec<u8>) -> Result<StorageReference> {
        let url = self.blob_url(id, None)?;
        let size = archive.len();

        let part = Part::bytes(archive)
            .file_name(archive_filename(id))
            .mime_str("application/gzip")?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        tracing::debug!(id = %id, size, "Uploading archive");
        let response = self.client.post(&url).multipart(form).send().await?;

        self.handle_response(response, StatusCode::CREATED).await
    }
}
