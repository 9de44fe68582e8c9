//! Stage domain types

use serde::{Deserialize, Serialize};
use std::fmt;

use super::meta::ObjectMeta;
use super::phase::Phase;
use super::workflow::StageConfig;

/// Position of a Stage or Task among its siblings of the same template name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ordinal(pub u32);

impl Ordinal {
    pub const FIRST: Ordinal = Ordinal(1);
}

impl Default for Ordinal {
    fn default() -> Self {
        Self::FIRST
    }
}

impl fmt::Display for Ordinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One execution of a template stage within a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub metadata: ObjectMeta,
    pub spec: StageSpec,
    #[serde(default)]
    pub status: StageStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    pub pipeline: String,
    pub template_stage: String,
    #[serde(default)]
    pub ordinal: Ordinal,
    /// Snapshot of the template stage taken at creation
    pub config: StageConfig,
}

impl Stage {
    /// Whether this is the stage derived from `(pipeline, template_stage, ordinal)`
    pub fn is_for(&self, pipeline: &str, template_stage: &str, ordinal: Ordinal) -> bool {
        self.spec.pipeline == pipeline
            && self.spec.template_stage == template_stage
            && self.spec.ordinal == ordinal
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
}
