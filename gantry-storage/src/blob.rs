//! Blob files on local disk

use std::io;
use std::path::{Path, PathBuf};

/// Filename used when an upload carries none
const DEFAULT_FILENAME: &str = "blob";

/// Reduces an uploaded filename to one safe path component
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Backing key for a blob: `{id}/{sanitized filename}`
pub fn blob_key(id: &str, filename: Option<&str>) -> String {
    let filename = filename
        .map(sanitize_filename)
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string());
    format!("{}/{}", id, filename)
}

/// Directory of blobs addressed by key
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Writes `data` under `key`, replacing the file atomically
    pub async fn write(&self, key: &str, data: &[u8]) -> io::Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("partial");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &path).await
    }

    /// Reads the blob under `key`, or `None` if the file is missing
    pub async fn read(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}
