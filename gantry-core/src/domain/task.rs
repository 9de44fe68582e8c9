//! Task domain types

use serde::{Deserialize, Serialize};

use super::meta::ObjectMeta;
use super::phase::Phase;
use super::stage::Ordinal;
use super::workflow::TaskConfig;

/// A unit of work submitted to the compute substrate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub metadata: ObjectMeta,
    pub spec: TaskSpec,
    #[serde(default)]
    pub status: TaskStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub stage: String,
    pub template_task: String,
    #[serde(default)]
    pub ordinal: Ordinal,
    /// Immutable snapshot of the template task. A Task without one is
    /// never submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<TaskConfig>,
}

impl Task {
    /// Whether this is the task derived from `(stage, template_task, ordinal)`
    pub fn is_for(&self, stage: &str, template_task: &str, ordinal: Ordinal) -> bool {
        self.spec.stage == stage
            && self.spec.template_task == template_task
            && self.spec.ordinal == ordinal
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
}
