//! Storage service configuration
//!
//! Everything the service needs is passed in at construction; nothing is
//! read from global state after startup.

use std::path::PathBuf;

/// Storage service configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// PostgreSQL URL for the index. `None` keeps the index in memory.
    pub database_url: Option<String>,

    /// Address the HTTP server binds to
    pub bind_addr: String,

    /// Directory blobs are written under
    pub root: PathBuf,

    /// Namespace LocalStorage index records are created in
    pub namespace: String,

    /// Largest accepted upload, in bytes
    pub max_upload_bytes: usize,
}

impl StorageConfig {
    /// Creates a new configuration with defaults
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            database_url: None,
            bind_addr: "0.0.0.0:8081".to_string(),
            root: root.into(),
            namespace: "default".to_string(),
            max_upload_bytes: 512 * 1024 * 1024,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - DATABASE_URL (optional, in-memory index when unset)
    /// - STORAGE_BIND_ADDR (optional, default: 0.0.0.0:8081)
    /// - STORAGE_ROOT (optional, default: ./data/storage)
    /// - STORAGE_NAMESPACE (optional, default: default)
    /// - STORAGE_MAX_UPLOAD_BYTES (optional, default: 512 MiB)
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        config.database_url = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());

        if let Ok(addr) = std::env::var("STORAGE_BIND_ADDR") {
            config.bind_addr = addr;
        }

        if let Ok(root) = std::env::var("STORAGE_ROOT") {
            config.root = PathBuf::from(root);
        }

        if let Ok(namespace) = std::env::var("STORAGE_NAMESPACE") {
            config.namespace = namespace;
        }

        if let Some(max) = std::env::var("STORAGE_MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        {
            config.max_upload_bytes = max;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if self.root.as_os_str().is_empty() {
            anyhow::bail!("storage root cannot be empty");
        }

        if self.namespace.is_empty() {
            anyhow::bail!("namespace cannot be empty");
        }

        if self.max_upload_bytes == 0 {
            anyhow::bail!("max_upload_bytes must be greater than 0");
        }

        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new("./data/storage")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StorageConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8081");
        assert_eq!(config.namespace, "default");
        assert!(config.database_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = StorageConfig::default();

        config.namespace = String::new();
        assert!(config.validate().is_err());

        config.namespace = "ci".to_string();
        config.max_upload_bytes = 0;
        assert!(config.validate().is_err());

        config.max_upload_bytes = 1024;
        assert!(config.validate().is_ok());
    }
}
