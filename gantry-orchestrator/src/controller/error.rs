//! Reconciliation errors

use gantry_core::domain::ObjectKey;
use gantry_store::StoreError;
use thiserror::Error;

use crate::substrate::SubstrateError;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("workflow template {0} not found")]
    MissingTemplate(ObjectKey),

    #[error("input '{input}' is not declared by workflow template {template}")]
    UnknownInput { input: String, template: String },

    #[error("unknown input type '{0}'")]
    UnknownInputType(String),

    #[error("unknown artifact source type '{0}'")]
    UnknownSourceType(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("compute substrate error: {0}")]
    Substrate(#[from] SubstrateError),
}

impl ReconcileError {
    /// Errors worth retrying immediately with backoff. Everything else is a
    /// configuration problem that waits for the next resync or a change to
    /// the objects involved.
    pub fn is_transient(&self) -> bool {
        match self {
            ReconcileError::Store(e) => e.is_transient(),
            ReconcileError::Substrate(_) => true,
            _ => false,
        }
    }
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::domain::Kind;

    #[test]
    fn test_transient_classification() {
        let key = ObjectKey::new("default", "p");
        let conflict = ReconcileError::Store(StoreError::Conflict {
            kind: Kind::Pipeline,
            key: key.clone(),
            expected: 1,
            actual: 2,
        });
        assert!(conflict.is_transient());
        assert!(!ReconcileError::MissingTemplate(key).is_transient());
        assert!(!ReconcileError::InvalidConfig("bad".to_string()).is_transient());
    }
}
