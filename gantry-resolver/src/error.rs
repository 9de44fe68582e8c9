//! Resolver errors

use gantry_client::ClientError;
use gantry_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("storage request failed: {0}")]
    Storage(#[from] ClientError),

    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },

    #[error("failed to build archive: {0}")]
    Archive(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid resolution config: {0}")]
    InvalidConfig(String),

    #[error("no resolver for source type '{0}'")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, ResolveError>;
