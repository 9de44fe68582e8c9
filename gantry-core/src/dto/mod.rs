//! Data Transfer Objects for inter-service communication
//!
//! Request and response shapes for the orchestrator API, plus the constants
//! the storage service and its clients agree on.

pub mod pipeline;
pub mod storage;
