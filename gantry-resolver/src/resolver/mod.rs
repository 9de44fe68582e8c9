//! Resolvers
//!
//! A resolver turns one resolution request into a stored blob. Resolvers
//! are picked from an ordered registry by the request's source type.

pub mod git;

pub use git::GitResolver;

use async_trait::async_trait;
use gantry_core::domain::StorageReference;
use std::sync::Arc;

use crate::error::Result;

/// One artifact to materialize
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRequest {
    /// Artifact name, reused as the storage id
    pub id: String,
    pub source_type: String,
    /// Canonical source config as stored on the Artifact
    pub config: String,
}

#[async_trait]
pub trait Resolver: Send + Sync {
    fn matches(&self, source_type: &str) -> bool;

    /// Makes sure the blob for `request` is in storage and returns where.
    /// Must be safe to repeat.
    async fn resolve(&self, request: &ResolutionRequest) -> Result<StorageReference>;
}

#[derive(Default)]
pub struct ResolverRegistry {
    resolvers: Vec<Arc<dyn Resolver>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, resolver: Arc<dyn Resolver>) {
        self.resolvers.push(resolver);
    }

    /// First resolver claiming `source_type`
    pub fn find(&self, source_type: &str) -> Option<Arc<dyn Resolver>> {
        self.resolvers
            .iter()
            .find(|resolver| resolver.matches(source_type))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    #[async_trait]
    impl Resolver for Fixed {
        fn matches(&self, source_type: &str) -> bool {
            source_type == self.0
        }

        async fn resolve(&self, request: &ResolutionRequest) -> Result<StorageReference> {
            Ok(StorageReference {
                status: gantry_core::domain::StorageStatus::Present,
                kind: self.0.to_string(),
                id: request.id.clone(),
            })
        }
    }

    #[tokio::test]
    async fn test_registry_picks_first_match() {
        let mut registry = ResolverRegistry::new();
        registry.register(Arc::new(Fixed("git")));
        registry.register(Arc::new(Fixed("http")));

        assert!(registry.find("svn").is_none());

        let resolver = registry.find("http").unwrap();
        let request = ResolutionRequest {
            id: "http-1".to_string(),
            source_type: "http".to_string(),
            config: "{}".to_string(),
        };
        assert_eq!(resolver.resolve(&request).await.unwrap().kind, "http");
    }
}
