//! Gantry Store
//!
//! The object store every control loop synchronizes through: versioned,
//! namespaced records with get/create/update/delete/list and a stream of
//! change notifications.
//!
//! Two implementations are provided:
//! - [`MemoryStore`]: single process, used by tests and local development
//! - [`PgStore`]: PostgreSQL backed, shared between services

pub mod cascade;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use cascade::cascade_delete;
pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{EventType, ObjectStore, StoreExt, WatchEvent};
