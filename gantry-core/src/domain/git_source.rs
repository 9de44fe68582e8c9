//! Git sources
//!
//! A GitSource watches one branch of a repository. Whenever the branch head
//! moves to a commit it has not seen, a Pipeline is started from the
//! configured template with that commit bound to the configured input.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use super::git::GIT_SOURCE_TYPE;
use super::meta::{Kind, ObjectMeta};
use super::pipeline::{Pipeline, PipelineInput, PipelineSpec};

/// Branch watched when none is given
pub const DEFAULT_BRANCH: &str = "master";

/// Minutes between polls when none is given
pub const DEFAULT_POLL_MINUTES: u32 = 1;

/// Label carrying the commit a GitSource pipeline was started for
pub const COMMIT_LABEL: &str = "gantry.dev/git-commit";

/// Commit sha characters kept in pipeline names
const SHORT_SHA_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitSource {
    pub metadata: ObjectMeta,
    pub spec: GitSourceSpec,
    #[serde(default)]
    pub status: GitSourceStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitSourceSpec {
    pub repository: GitRepositoryOptions,
    #[serde(default)]
    pub clone: GitCloneOptions,
    #[serde(default)]
    pub poll: PollOptions,
    pub trigger: GitSourceTrigger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRepositoryOptions {
    pub url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitCloneOptions {
    /// Recorded for clients. Resolution always fetches the single commit it
    /// needs and archives leave `.git` out, so history depth never changes
    /// an artifact.
    #[serde(default)]
    pub shallow: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_minutes: Option<u32>,
}

impl PollOptions {
    pub fn interval(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(
            self.interval_minutes.unwrap_or(DEFAULT_POLL_MINUTES),
        ))
    }
}

/// What a new commit starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitSourceTrigger {
    /// Workflow template in the source's namespace
    pub template_name: String,
    /// Template input the commit is bound to; must be a git input of the
    /// same repository
    pub input: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitSourceStatus {
    /// Head commit a pipeline was last started for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_commit_sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_polled_at: Option<DateTime<Utc>>,
    /// Why the last poll did not start a pipeline, if it failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GitSource {
    /// Whether the poll interval has passed since the last poll
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.status.last_polled_at {
            Some(last) => now >= last + self.spec.poll.interval(),
            None => true,
        }
    }

    /// Name of the pipeline started for `sha`
    pub fn pipeline_name(&self, sha: &str) -> String {
        let short = sha.get(..SHORT_SHA_LEN).unwrap_or(sha);
        format!("{}-{}", self.metadata.name, short)
    }

    /// Pipeline run for `sha`, owned by this source
    pub fn pipeline_for(&self, sha: &str) -> Pipeline {
        let mut inputs = BTreeMap::new();
        inputs.insert(
            self.spec.trigger.input.clone(),
            PipelineInput {
                source_type: GIT_SOURCE_TYPE.to_string(),
                config: json!({ "commit": sha }),
                artifact_ref: None,
            },
        );

        Pipeline {
            metadata: ObjectMeta::new(self.metadata.namespace.clone(), self.pipeline_name(sha))
                .with_owner(Kind::GitSource, self.metadata.name.clone())
                .with_label(COMMIT_LABEL, sha),
            spec: PipelineSpec {
                template_name: self.spec.trigger.template_name.clone(),
                inputs,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> GitSource {
        serde_json::from_str(
            r#"{
                "metadata": {"name": "app", "namespace": "default"},
                "spec": {
                    "repository": {"url": "https://example.com/app.git"},
                    "trigger": {"template_name": "ci", "input": "src"}
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let source = source();
        assert_eq!(source.spec.repository.branch, "master");
        assert!(!source.spec.clone.shallow);
        assert_eq!(source.spec.poll.interval(), TimeDelta::minutes(1));
        assert!(source.status.last_commit_sha.is_none());
    }

    #[test]
    fn test_is_due_after_interval() {
        let mut source = source();
        source.spec.poll.interval_minutes = Some(5);
        let now = Utc::now();
        assert!(source.is_due(now));

        source.status.last_polled_at = Some(now);
        assert!(!source.is_due(now + TimeDelta::minutes(4)));
        assert!(source.is_due(now + TimeDelta::minutes(5)));
    }

    #[test]
    fn test_pipeline_for_commit() {
        let sha = "4f2c9a1d0e5b7c3f9a8d6e4b2c1a0f9e8d7c6b5a";
        let pipeline = source().pipeline_for(sha);

        assert_eq!(pipeline.metadata.name, "app-4f2c9a1d0e5b");
        assert!(pipeline.metadata.is_owned_by(Kind::GitSource, "app"));
        assert_eq!(pipeline.metadata.labels[COMMIT_LABEL], sha);
        assert_eq!(pipeline.spec.template_name, "ci");

        let input = &pipeline.spec.inputs["src"];
        assert_eq!(input.source_type, "git");
        assert_eq!(input.config, json!({ "commit": sha }));
        assert!(input.artifact_ref.is_none());
    }
}
