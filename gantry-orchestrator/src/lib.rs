//! Gantry Orchestrator
//!
//! Declarative pipeline runs driven by independent reconcilers over a
//! shared object store, plus the HTTP API used to declare them.

pub mod api;
pub mod config;
pub mod controller;
pub mod service;
pub mod source;
pub mod substrate;

pub use api::create_router;
pub use config::OrchestratorConfig;
pub use controller::{ControllerContext, ControllerManager};
