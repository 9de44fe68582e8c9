//! Gantry Core
//!
//! Core types and abstractions for the Gantry pipeline orchestrator.
//!
//! This crate contains:
//! - Domain types: every stored record (WorkflowTemplate, Pipeline, Stage, ...)
//! - Identity: content-addressed artifact naming
//! - DTOs: Data transfer objects for inter-service communication

pub mod domain;
pub mod dto;
pub mod identity;
