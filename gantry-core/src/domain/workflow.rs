//! Workflow template domain types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::meta::ObjectMeta;

/// Reusable pipeline definition: named inputs plus ordered stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    pub metadata: ObjectMeta,
    pub spec: WorkflowSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSpec {
    #[serde(default)]
    pub inputs: BTreeMap<String, InputConfig>,
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

/// Template-level declaration of a pipeline input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(default)]
    pub config: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub name: String,
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskConfig>,
}

/// Template task, snapshotted onto each Task at creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub image: String,
    pub shell: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub inputs: BTreeMap<String, TaskInput>,
    #[serde(default)]
    pub outputs: BTreeMap<String, TaskOutput>,
}

/// Where a task consumes an input from and where it lands in the container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInput {
    pub from: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    #[serde(rename = "type")]
    pub output_type: String,
    #[serde(default)]
    pub config: Value,
}

impl WorkflowTemplate {
    pub fn input(&self, name: &str) -> Option<&InputConfig> {
        self.spec.inputs.get(name)
    }

    pub fn stage(&self, name: &str) -> Option<&StageConfig> {
        self.spec.stages.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_from_json() {
        let json = r#"{
            "metadata": {"name": "ci", "namespace": "default"},
            "spec": {
                "inputs": {"src": {"type": "git", "config": {"repository": "https://example.com/r.git"}}},
                "stages": [
                    {"name": "build", "tasks": {"compile": {"image": "rust:1", "shell": "cargo build"}}},
                    {"name": "test", "tasks": {}}
                ]
            }
        }"#;
        let template: WorkflowTemplate = serde_json::from_str(json).unwrap();

        assert_eq!(template.input("src").unwrap().source_type, "git");
        assert_eq!(template.spec.stages[0].name, "build");
        let compile = &template.stage("build").unwrap().tasks["compile"];
        assert_eq!(compile.image, "rust:1");
        assert!(compile.working_dir.is_none());
        assert!(template.stage("deploy").is_none());
    }
}
