//! Pipeline domain types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::meta::ObjectMeta;

/// A single run of a workflow template with concrete input values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub metadata: ObjectMeta,
    pub spec: PipelineSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub template_name: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, PipelineInput>,
}

/// Instance-level value for a template input.
///
/// An empty `source_type` inherits the template input's type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineInput {
    #[serde(rename = "type", default)]
    pub source_type: String,
    #[serde(default)]
    pub config: Value,
    /// Set once by the pipeline reconciler, never cleared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_ref: Option<ArtifactRef>,
}

/// Name of the Artifact an input resolved to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub name: String,
}

impl Pipeline {
    /// Whether any input references the named artifact
    pub fn references_artifact(&self, artifact: &str) -> bool {
        self.spec.inputs.values().any(|input| {
            input
                .artifact_ref
                .as_ref()
                .is_some_and(|r| r.name == artifact)
        })
    }
}
