//! Gantry Storage Client
//!
//! A small, typed HTTP client for the Gantry storage service. The resolver
//! uses it to check whether a blob already exists and to upload new ones.
//!
//! # Example
//!
//! ```no_run
//! use gantry_client::StorageClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = StorageClient::new("http://localhost:8081");
//!
//!     match client.status("git-0123").await? {
//!         Some(reference) => println!("Already stored as {}", reference.id),
//!         None => println!("Not stored yet"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
mod storage;

// Re-export commonly used types
pub use error::{ClientError, Result};

use gantry_core::dto::storage::STORAGE_PATH_PREFIX;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

/// HTTP client for the storage service API
#[derive(Debug, Clone)]
pub struct StorageClient {
    /// Base URL of the storage service (e.g., "http://localhost:8081")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl StorageClient {
    /// Create a new storage client
    ///
    /// # Example
    /// ```
    /// use gantry_client::StorageClient;
    ///
    /// let client = StorageClient::new("http://localhost:8081");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new storage client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the storage service
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the blob with the given id, plus an optional trailing segment
    fn blob_url(&self, id: &str, suffix: Option<&str>) -> Result<String> {
        if id.is_empty() || id.contains('/') {
            return Err(ClientError::InvalidRequest(format!(
                "invalid blob id '{}'",
                id
            )));
        }

        let mut url = format!("{}{}/{}", self.base_url, STORAGE_PATH_PREFIX, id);
        if let Some(suffix) = suffix {
            url.push('/');
            url.push_str(suffix);
        }
        Ok(url)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Deserialize a JSON body if the status is exactly `expected`
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        expected: StatusCode,
    ) -> Result<T> {
        let status = response.status();

        if status != expected {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = StorageClient::new("http://localhost:8081");
        assert_eq!(client.base_url(), "http://localhost:8081");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = StorageClient::new("http://localhost:8081/");
        assert_eq!(client.base_url(), "http://localhost:8081");
    }

    #[test]
    fn test_blob_urls() {
        let client = StorageClient::new("http://localhost:8081");
        assert_eq!(
            client.blob_url("git-abc", Some("status")).unwrap(),
            "http://localhost:8081/v1alpha1/api/core/storage/git-abc/status"
        );
        assert_eq!(
            client.blob_url("git-abc", None).unwrap(),
            "http://localhost:8081/v1alpha1/api/core/storage/git-abc"
        );
    }

    #[test]
    fn test_blob_url_rejects_bad_ids() {
        let client = StorageClient::new("http://localhost:8081");
        assert!(client.blob_url("", None).is_err());
        assert!(client.blob_url("a/b", None).is_err());
    }
}
