//! Git source configuration and resolution tickets

use serde::{Deserialize, Serialize};

use super::artifact::StorageReference;
use super::meta::ObjectMeta;

/// Source type tag for git artifacts
pub const GIT_SOURCE_TYPE: &str = "git";

/// Template-level git input config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    pub repository: String,
}

/// Pipeline-level git input config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitInputConfig {
    pub commit: String,
}

/// Work ticket asking the out-of-band resolver to materialize a commit.
///
/// Named after, and owned by, the Artifact it resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitArtifactResolution {
    pub metadata: ObjectMeta,
    pub spec: GitArtifactResolutionSpec,
    #[serde(default)]
    pub status: GitArtifactResolutionStatus,
}

/// Merged git configuration. Its JSON form is the artifact's source config,
/// so field order here determines artifact identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitArtifactResolutionSpec {
    pub repository_url: String,
    pub commit_sha: String,
}

impl GitArtifactResolutionSpec {
    pub fn merge(repo: RepoConfig, input: GitInputConfig) -> Self {
        Self {
            repository_url: repo.repository,
            commit_sha: input.commit,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(config: &str) -> serde_json::Result<Self> {
        serde_json::from_str(config)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitArtifactResolutionStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<ResolutionPhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<StorageReference>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionPhase {
    InProgress,
    Resolved,
}

impl GitArtifactResolution {
    pub fn is_resolved(&self) -> bool {
        self.status.phase == Some(ResolutionPhase::Resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merged_config_json_is_stable() {
        let spec = GitArtifactResolutionSpec::merge(
            RepoConfig {
                repository: "https://example.com/r.git".to_string(),
            },
            GitInputConfig {
                commit: "0123abcd".to_string(),
            },
        );
        let json = spec.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"repository_url":"https://example.com/r.git","commit_sha":"0123abcd"}"#
        );
        assert_eq!(GitArtifactResolutionSpec::from_json(&json).unwrap(), spec);
    }

    #[test]
    fn test_from_json_rejects_incomplete_config() {
        assert!(GitArtifactResolutionSpec::from_json(r#"{"repository_url":"u"}"#).is_err());
    }
}
