//! Gantry Resolver
//!
//! Out-of-band worker that materializes artifacts: it picks up resolution
//! tickets from the object store, packs the requested source into an
//! archive, uploads it to the storage service and records the reference.
//! It also polls git sources and starts a pipeline for each new commit.

pub mod archive;
pub mod config;
pub mod error;
pub mod resolver;
pub mod scheduler;

pub use config::Config;
pub use error::ResolveError;
pub use resolver::{GitResolver, ResolutionRequest, Resolver, ResolverRegistry};
pub use scheduler::{ResolutionPoller, SourcePoller};
