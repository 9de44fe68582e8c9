//! Object store errors

use gantry_core::domain::{Kind, ObjectKey};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {key} not found")]
    NotFound { kind: Kind, key: ObjectKey },

    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: Kind, key: ObjectKey },

    #[error("{kind} {key} was modified concurrently (expected version {expected}, found {actual})")]
    Conflict {
        kind: Kind,
        key: ObjectKey,
        expected: u64,
        actual: u64,
    },

    #[error("stored object is not a {expected}")]
    KindMismatch { expected: Kind },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    /// Errors worth retrying as-is
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Conflict { .. } | StoreError::Database(_))
    }
}
