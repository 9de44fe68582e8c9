//! Gantry Storage
//!
//! Content-addressable blob store over HTTP. Callers choose the id; the
//! service persists the bytes to disk and records a write-once index entry
//! in the object store.

pub mod api;
pub mod blob;
pub mod config;
pub mod service;

pub use api::create_router;
pub use blob::BlobStore;
pub use config::StorageConfig;
pub use service::{StorageError, StorageService};
