//! Artifact Service
//!
//! Read-only access to artifacts and their resolution state.

use gantry_core::domain::{Artifact, ObjectKey};
use gantry_store::{ObjectStore, StoreExt};

use super::pipeline::{PipelineError, Result};

/// Get an artifact
pub async fn get_artifact(store: &dyn ObjectStore, key: &ObjectKey) -> Result<Artifact> {
    store
        .fetch::<Artifact>(key)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("Artifact {} not found", key)))
}

/// All artifacts in a namespace, ordered by name
pub async fn list_artifacts(store: &dyn ObjectStore, namespace: &str) -> Result<Vec<Artifact>> {
    Ok(store.list_resources::<Artifact>(Some(namespace)).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::domain::{ArtifactSource, ArtifactSpec, ObjectMeta};
    use gantry_store::MemoryStore;

    fn artifact(namespace: &str, name: &str) -> Artifact {
        Artifact {
            metadata: ObjectMeta::new(namespace, name),
            spec: ArtifactSpec {
                source: ArtifactSource {
                    source_type: "git".to_string(),
                    config: "{}".to_string(),
                },
            },
            status: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_get_missing_artifact() {
        let store = MemoryStore::new();
        let result = get_artifact(&store, &ObjectKey::new("default", "git-00")).await;
        assert!(matches!(result, Err(PipelineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_artifacts_by_namespace() {
        let store = MemoryStore::new();
        store.create_resource(artifact("default", "git-b")).await.unwrap();
        store.create_resource(artifact("default", "git-a")).await.unwrap();
        store.create_resource(artifact("other", "git-c")).await.unwrap();

        let artifacts = list_artifacts(&store, "default").await.unwrap();
        let names: Vec<_> = artifacts.iter().map(|a| a.metadata.name.as_str()).collect();
        assert_eq!(names, vec!["git-a", "git-b"]);
    }
}
