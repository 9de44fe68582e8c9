//! Template, pipeline and git source DTOs for the orchestrator API

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::domain::{GitSourceSpec, Ordinal, Phase, Stage, WorkflowSpec};

fn default_namespace() -> String {
    "default".to_string()
}

/// Request to register a workflow template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTemplate {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub name: String,
    pub spec: WorkflowSpec,
}

/// Request to start a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePipeline {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub name: String,
    pub template_name: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, CreateInput>,
}

/// Concrete value for a template input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInput {
    #[serde(rename = "type", default)]
    pub source_type: String,
    #[serde(default)]
    pub config: Value,
}

/// Request to start watching a branch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGitSource {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub name: String,
    pub spec: GitSourceSpec,
}

/// Stage as listed under a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSummary {
    pub name: String,
    pub template_stage: String,
    pub ordinal: Ordinal,
    pub phase: Option<Phase>,
}

impl From<Stage> for StageSummary {
    fn from(stage: Stage) -> Self {
        Self {
            name: stage.metadata.name,
            template_stage: stage.spec.template_stage,
            ordinal: stage.spec.ordinal,
            phase: stage.status.phase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_defaults() {
        let req: CreatePipeline = serde_json::from_str(
            r#"{"name": "p", "template_name": "ci", "inputs": {"src": {"config": {"commit": "abc"}}}}"#,
        )
        .unwrap();
        assert_eq!(req.namespace, "default");
        assert!(req.inputs["src"].source_type.is_empty());
    }

    #[test]
    fn test_git_source_request_defaults() {
        let req: CreateGitSource = serde_json::from_str(
            r#"{
                "name": "app",
                "spec": {
                    "repository": {"url": "https://example.com/app.git", "branch": "main"},
                    "clone": {"shallow": true},
                    "poll": {"interval_minutes": 5},
                    "trigger": {"template_name": "ci", "input": "src"}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(req.namespace, "default");
        assert_eq!(req.spec.repository.branch, "main");
        assert!(req.spec.clone.shallow);
        assert_eq!(req.spec.poll.interval_minutes, Some(5));
    }
}
