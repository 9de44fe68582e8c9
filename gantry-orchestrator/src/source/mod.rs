//! Artifact sources
//!
//! An ordered registry of source handlers selected by the input's type tag.
//! A handler knows how to merge template and pipeline config into the
//! canonical artifact config, and how to ask for an artifact to be resolved.

pub mod git;

pub use git::GitSource;

use async_trait::async_trait;
use gantry_core::domain::Artifact;
use gantry_store::ObjectStore;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::controller::{ReconcileError, ReconcileResult};

#[async_trait]
pub trait ArtifactSource: Send + Sync {
    fn matches(&self, source_type: &str) -> bool;

    /// Merges template-level and pipeline-level config into the JSON text
    /// stored on the Artifact. Equal inputs must give byte-identical output.
    fn canonical_config(&self, template: &Value, instance: &Value) -> ReconcileResult<String>;

    /// Creates whatever out-of-band work item resolves this artifact.
    /// Must be safe to call on every pass.
    async fn request_resolution(
        &self,
        store: &dyn ObjectStore,
        artifact: &Artifact,
    ) -> ReconcileResult<()>;
}

#[derive(Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn ArtifactSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in source
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GitSource));
        registry
    }

    pub fn register(&mut self, source: Arc<dyn ArtifactSource>) {
        self.sources.push(source);
    }

    /// First source claiming `source_type`
    pub fn find(&self, source_type: &str) -> Option<Arc<dyn ArtifactSource>> {
        self.sources
            .iter()
            .find(|source| source.matches(source_type))
            .cloned()
    }
}

/// Decodes a config value that is either a JSON object or a string
/// containing one.
pub(crate) fn decode_config<T: DeserializeOwned>(value: &Value, what: &str) -> ReconcileResult<T> {
    let decoded = match value {
        Value::String(text) => serde_json::from_str(text),
        other => serde_json::from_value(other.clone()),
    };
    decoded.map_err(|e| ReconcileError::InvalidConfig(format!("malformed {}: {}", what, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_by_type() {
        let registry = SourceRegistry::with_defaults();
        assert!(registry.find("git").is_some());
        assert!(registry.find("s3").is_none());
        assert!(SourceRegistry::new().find("git").is_none());
    }
}
