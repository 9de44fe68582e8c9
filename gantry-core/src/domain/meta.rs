//! Object metadata shared by every stored record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of a stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    WorkflowTemplate,
    Pipeline,
    Stage,
    Task,
    Artifact,
    GitArtifactResolution,
    Job,
    LocalStorage,
    GitSource,
}

impl Kind {
    /// Every kind, in owner-before-owned order
    pub const ALL: [Kind; 9] = [
        Kind::GitSource,
        Kind::WorkflowTemplate,
        Kind::Pipeline,
        Kind::Stage,
        Kind::Task,
        Kind::Artifact,
        Kind::GitArtifactResolution,
        Kind::Job,
        Kind::LocalStorage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::WorkflowTemplate => "WorkflowTemplate",
            Kind::Pipeline => "Pipeline",
            Kind::Stage => "Stage",
            Kind::Task => "Task",
            Kind::Artifact => "Artifact",
            Kind::GitArtifactResolution => "GitArtifactResolution",
            Kind::Job => "Job",
            Kind::LocalStorage => "LocalStorage",
            Kind::GitSource => "GitSource",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Namespace-qualified name identifying an object of a given kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Reference from an owned object to its owner.
///
/// Owners always live in the same namespace as the objects they own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerRef {
    pub kind: Kind,
    pub name: String,
}

/// Metadata carried by every stored record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,

    /// Optimistic concurrency token, assigned by the store
    #[serde(default)]
    pub resource_version: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerRef>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            resource_version: 0,
            owner: None,
            labels: BTreeMap::new(),
            created_at: None,
        }
    }

    pub fn with_owner(mut self, kind: Kind, name: impl Into<String>) -> Self {
        self.owner = Some(OwnerRef {
            kind,
            name: name.into(),
        });
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }

    /// Whether this object is owned by `kind`/`name`
    pub fn is_owned_by(&self, kind: Kind, name: &str) -> bool {
        self.owner
            .as_ref()
            .is_some_and(|owner| owner.kind == kind && owner.name == name)
    }
}
