//! Git artifact source

use async_trait::async_trait;
use gantry_core::domain::{
    Artifact, GIT_SOURCE_TYPE, GitArtifactResolution, GitArtifactResolutionSpec, GitInputConfig,
    Kind, ObjectMeta, RepoConfig,
};
use gantry_store::{ObjectStore, StoreExt};
use serde_json::Value;
use tracing::info;

use super::{ArtifactSource, decode_config};
use crate::controller::{ReconcileError, ReconcileResult};

/// Template config `{"repository": url}` plus pipeline config
/// `{"commit": sha}`, resolved by a `GitArtifactResolution` ticket.
pub struct GitSource;

#[async_trait]
impl ArtifactSource for GitSource {
    fn matches(&self, source_type: &str) -> bool {
        source_type == GIT_SOURCE_TYPE
    }

    fn canonical_config(&self, template: &Value, instance: &Value) -> ReconcileResult<String> {
        let repo: RepoConfig = decode_config(template, "git repository config")?;
        let input: GitInputConfig = decode_config(instance, "git input config")?;

        if repo.repository.trim().is_empty() {
            return Err(ReconcileError::InvalidConfig(
                "git repository url is empty".to_string(),
            ));
        }
        if input.commit.trim().is_empty() {
            return Err(ReconcileError::InvalidConfig(
                "git commit is empty".to_string(),
            ));
        }

        GitArtifactResolutionSpec::merge(repo, input)
            .to_json()
            .map_err(|e| ReconcileError::InvalidConfig(e.to_string()))
    }

    async fn request_resolution(
        &self,
        store: &dyn ObjectStore,
        artifact: &Artifact,
    ) -> ReconcileResult<()> {
        let spec = GitArtifactResolutionSpec::from_json(&artifact.spec.source.config).map_err(|e| {
            ReconcileError::InvalidConfig(format!(
                "artifact {} has malformed git config: {}",
                artifact.metadata.name, e
            ))
        })?;

        let ticket = GitArtifactResolution {
            metadata: ObjectMeta::new(
                artifact.metadata.namespace.clone(),
                artifact.metadata.name.clone(),
            )
            .with_owner(Kind::Artifact, artifact.metadata.name.clone()),
            spec,
            status: Default::default(),
        };

        let (ticket, created) = store.get_or_create(ticket).await?;
        if created {
            info!(
                artifact = %artifact.metadata.key(),
                repository = %ticket.spec.repository_url,
                commit = %ticket.spec.commit_sha,
                "Requested git resolution"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_config_merges_template_and_instance() {
        let config = GitSource
            .canonical_config(
                &json!({"repository": "https://example.com/r.git"}),
                &json!({"commit": "0123abcd"}),
            )
            .unwrap();
        assert_eq!(
            config,
            r#"{"repository_url":"https://example.com/r.git","commit_sha":"0123abcd"}"#
        );
    }

    #[test]
    fn test_canonical_config_accepts_json_strings() {
        let from_objects = GitSource
            .canonical_config(&json!({"repository": "u"}), &json!({"commit": "c"}))
            .unwrap();
        let from_strings = GitSource
            .canonical_config(
                &Value::String(r#"{"repository": "u"}"#.to_string()),
                &Value::String(r#"{"commit":"c"}"#.to_string()),
            )
            .unwrap();
        assert_eq!(from_objects, from_strings);
    }

    #[test]
    fn test_canonical_config_rejects_malformed_input() {
        let err = GitSource
            .canonical_config(&json!({"repository": "u"}), &json!({"sha": "c"}))
            .unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidConfig(_)));

        let err = GitSource
            .canonical_config(&json!({"repository": ""}), &json!({"commit": "c"}))
            .unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidConfig(_)));
    }
}
