//! Storage Service
//!
//! Blob bookkeeping: every stored blob has a write-once LocalStorage index
//! record in the object store mapping its id to the backing key.

use gantry_core::domain::{
    LocalStorage, LocalStorageSpec, ObjectKey, ObjectMeta, StorageReference, StorageStatus,
};
use gantry_core::dto::storage::LOCAL_STORAGE_KIND;
use gantry_store::{ObjectStore, StoreError, StoreExt};
use std::sync::Arc;

use crate::blob::{BlobStore, blob_key};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("blob {0} not found")]
    NotFound(String),

    #[error("blob {0} already exists")]
    AlreadyExists(String),

    #[error("invalid blob id '{0}'")]
    InvalidId(String),

    #[error("blob I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Ids become index record names and directory names, so they are kept to
/// a conservative character set.
pub fn validate_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id.len() <= 255
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidId(id.to_string()))
    }
}

pub fn reference(id: &str) -> StorageReference {
    StorageReference {
        status: StorageStatus::Present,
        kind: LOCAL_STORAGE_KIND.to_string(),
        id: id.to_string(),
    }
}

pub struct StorageService {
    store: Arc<dyn ObjectStore>,
    blobs: BlobStore,
    namespace: String,
}

impl StorageService {
    pub fn new(store: Arc<dyn ObjectStore>, blobs: BlobStore, namespace: impl Into<String>) -> Self {
        Self {
            store,
            blobs,
            namespace: namespace.into(),
        }
    }

    fn index_key(&self, id: &str) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), id)
    }

    async fn index(&self, id: &str) -> Result<LocalStorage> {
        validate_id(id)?;
        self.store
            .fetch::<LocalStorage>(&self.index_key(id))
            .await?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    /// Reference to a stored blob
    pub async fn status(&self, id: &str) -> Result<StorageReference> {
        self.index(id).await?;
        Ok(reference(id))
    }

    /// Contents of a stored blob
    pub async fn read(&self, id: &str) -> Result<Vec<u8>> {
        let record = self.index(id).await?;
        self.blobs
            .read(&record.spec.key)
            .await?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    /// Stores a new blob. An id can only be written once.
    pub async fn upload(
        &self,
        id: &str,
        filename: Option<&str>,
        data: &[u8],
    ) -> Result<StorageReference> {
        validate_id(id)?;
        if self
            .store
            .fetch::<LocalStorage>(&self.index_key(id))
            .await?
            .is_some()
        {
            return Err(StorageError::AlreadyExists(id.to_string()));
        }

        let key = blob_key(id, filename);
        self.blobs.write(&key, data).await?;

        let record = LocalStorage {
            metadata: ObjectMeta::new(self.namespace.clone(), id),
            spec: LocalStorageSpec { key: key.clone() },
        };
        match self.store.create_resource(record).await {
            Ok(_) => {}
            Err(e) if e.is_already_exists() => {
                return Err(StorageError::AlreadyExists(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(id = %id, key = %key, size = data.len(), "Blob stored");
        Ok(reference(id))
    }
}
