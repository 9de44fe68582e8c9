//! Deterministic naming
//!
//! Artifact names are a pure function of the source type and its expanded
//! config, so every pipeline asking for the same content lands on the same
//! object. Stage and Task names are derived from their parent and ordinal,
//! joined with a separator that plain names may not contain.

use sha2::{Digest, Sha224};

use crate::domain::Ordinal;

/// Label carrying an artifact's source type
pub const SOURCE_TYPE_LABEL: &str = "gantry.dev/source-type";

/// Label carrying the hash of an artifact's source config
pub const SOURCE_CONFIG_HASH_LABEL: &str = "gantry.dev/source-config-hash";

/// Lowercase hex SHA-224 of `data`
pub fn content_hash(data: &[u8]) -> String {
    format!("{:x}", Sha224::digest(data))
}

/// `<type>-<hash of config>`
pub fn artifact_name(source_type: &str, config: &str) -> String {
    format!("{}-{}", source_type, content_hash(config.as_bytes()))
}

/// Joins the parts of a derived name. Validated names never contain it, so
/// a derived name splits back into exactly one `(parent, child, ordinal)`.
pub const NAME_SEPARATOR: char = '.';

/// `<pipeline>.<stage>.<ordinal>`
pub fn stage_name(pipeline: &str, stage: &str, ordinal: Ordinal) -> String {
    format!("{pipeline}{NAME_SEPARATOR}{stage}{NAME_SEPARATOR}{ordinal}")
}

/// `<stage object name>.<task>.<ordinal>`
pub fn task_name(stage: &str, task: &str, ordinal: Ordinal) -> String {
    format!("{stage}{NAME_SEPARATOR}{task}{NAME_SEPARATOR}{ordinal}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_known_vectors() {
        assert_eq!(
            content_hash(b""),
            "d14a028c2a3a2bc9476102bb288234c415a2b01f828ea62ac5b3e42f"
        );
        assert_eq!(
            content_hash(b"abc"),
            "23097d223405d8228642a477bda255b32aadbce4bda0b3f7e36c9da7"
        );
    }

    #[test]
    fn test_artifact_name_is_deterministic() {
        let config = r#"{"repository_url":"https://example.com/r.git","commit_sha":"abc"}"#;
        let a = artifact_name("git", config);
        let b = artifact_name("git", config);
        assert_eq!(a, b);
        assert!(a.starts_with("git-"));
        assert_eq!(a.len(), "git-".len() + 56);

        let other = artifact_name("git", r#"{"repository_url":"https://example.com/r.git","commit_sha":"def"}"#);
        assert_ne!(a, other);
    }

    #[test]
    fn test_child_names() {
        let stage = stage_name("p", "build", Ordinal::FIRST);
        assert_eq!(stage, "p.build.1");
        assert_eq!(task_name(&stage, "compile", Ordinal::FIRST), "p.build.1.compile.1");
    }

    #[test]
    fn test_dashed_names_do_not_collide() {
        // Dashes inside a part must not move the boundaries between parts
        assert_ne!(
            stage_name("a", "b-c", Ordinal::FIRST),
            stage_name("a-b", "c", Ordinal::FIRST)
        );
        assert_ne!(
            task_name("s", "x-y", Ordinal::FIRST),
            task_name("s-x", "y", Ordinal::FIRST)
        );
    }
}
