//! Artifact domain types

use serde::{Deserialize, Serialize};
use std::fmt;

use super::meta::ObjectMeta;

/// Content-addressed build input, shared by every pipeline that asks for the
/// same source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub metadata: ObjectMeta,
    pub spec: ArtifactSpec,
    #[serde(default)]
    pub status: ArtifactStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    pub source: ArtifactSource,
}

/// Source type plus the fully expanded resolver configuration as JSON text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSource {
    #[serde(rename = "type", default)]
    pub source_type: String,
    #[serde(default)]
    pub config: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<ArtifactPhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<StorageReference>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactPhase {
    Invalid,
    Unresolved,
    Resolved,
}

impl ArtifactPhase {
    /// Phase implied by an artifact's source and reference
    pub fn derive(source: &ArtifactSource, reference: Option<&StorageReference>) -> Self {
        if source.source_type.is_empty() {
            ArtifactPhase::Invalid
        } else if reference.is_some() {
            ArtifactPhase::Resolved
        } else {
            ArtifactPhase::Unresolved
        }
    }

    /// `Resolved` is terminal.
    pub fn can_transition(current: Option<ArtifactPhase>, next: ArtifactPhase) -> bool {
        !matches!(current, Some(ArtifactPhase::Resolved)) || next == ArtifactPhase::Resolved
    }

    /// Phase to write, or `None` when unchanged or regressing
    pub fn advance(current: Option<ArtifactPhase>, next: ArtifactPhase) -> Option<ArtifactPhase> {
        if current == Some(next) || !Self::can_transition(current, next) {
            None
        } else {
            Some(next)
        }
    }
}

impl fmt::Display for ArtifactPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArtifactPhase::Invalid => "Invalid",
            ArtifactPhase::Unresolved => "Unresolved",
            ArtifactPhase::Resolved => "Resolved",
        };
        f.write_str(s)
    }
}

impl Artifact {
    pub fn is_resolved(&self) -> bool {
        self.status.phase == Some(ArtifactPhase::Resolved)
    }
}

/// Pointer to a blob held by a storage backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageReference {
    pub status: StorageStatus,
    pub kind: String,
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageStatus {
    Present,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn git_source() -> ArtifactSource {
        ArtifactSource {
            source_type: "git".to_string(),
            config: r#"{"repository_url":"u","commit_sha":"c"}"#.to_string(),
        }
    }

    fn reference() -> StorageReference {
        StorageReference {
            status: StorageStatus::Present,
            kind: "localstorage.v1alpha1.core.gantry.dev".to_string(),
            id: "git-abc".to_string(),
        }
    }

    #[test]
    fn test_derive_phase() {
        let empty = ArtifactSource {
            source_type: String::new(),
            config: String::new(),
        };
        assert_eq!(ArtifactPhase::derive(&empty, None), ArtifactPhase::Invalid);
        assert_eq!(
            ArtifactPhase::derive(&git_source(), None),
            ArtifactPhase::Unresolved
        );
        assert_eq!(
            ArtifactPhase::derive(&git_source(), Some(&reference())),
            ArtifactPhase::Resolved
        );
    }

    #[test]
    fn test_resolved_never_regresses() {
        assert_eq!(
            ArtifactPhase::advance(Some(ArtifactPhase::Resolved), ArtifactPhase::Unresolved),
            None
        );
        assert_eq!(
            ArtifactPhase::advance(Some(ArtifactPhase::Unresolved), ArtifactPhase::Resolved),
            Some(ArtifactPhase::Resolved)
        );
        assert_eq!(
            ArtifactPhase::advance(None, ArtifactPhase::Unresolved),
            Some(ArtifactPhase::Unresolved)
        );
    }

    #[test]
    fn test_storage_reference_wire_format() {
        let json = serde_json::to_value(reference()).unwrap();
        assert_eq!(json["status"], "present");
        assert_eq!(json["id"], "git-abc");
    }
}
