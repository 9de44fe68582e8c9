//! Storage service index records

use serde::{Deserialize, Serialize};

use super::meta::ObjectMeta;

/// Write-once mapping from a blob id (the record name) to its backing key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalStorage {
    pub metadata: ObjectMeta,
    pub spec: LocalStorageSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalStorageSpec {
    pub key: String,
}
