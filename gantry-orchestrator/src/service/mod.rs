//! Service Module
//!
//! Business logic behind the HTTP API. Services only read and write
//! declarations; reconciliation happens in the controllers.

pub mod artifact;
pub mod git_source;
pub mod pipeline;

pub use artifact as artifact_service;
pub use git_source as git_source_service;
pub use pipeline as pipeline_service;
