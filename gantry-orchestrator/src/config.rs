//! Orchestrator configuration
//!
//! Control loop timing and storage locations. Values come from the
//! environment at startup and are passed down explicitly.

use std::path::PathBuf;
use std::time::Duration;

use crate::controller::RetryPolicy;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// PostgreSQL URL for the object store. `None` keeps state in memory.
    pub database_url: Option<String>,

    /// Address the HTTP API binds to
    pub bind_addr: String,

    /// How often every controller re-lists its kind
    pub resync_interval: Duration,

    /// Attempts per reconcile pass for transient failures
    pub retry_max_attempts: u32,

    /// First backoff delay; doubles on each retry
    pub retry_initial_delay: Duration,

    /// Host directory task volumes are created under
    pub work_root: PathBuf,
}

impl OrchestratorConfig {
    /// Creates a new configuration with defaults
    pub fn new(work_root: impl Into<PathBuf>) -> Self {
        Self {
            database_url: None,
            bind_addr: "0.0.0.0:8080".to_string(),
            resync_interval: Duration::from_secs(30),
            retry_max_attempts: 5,
            retry_initial_delay: Duration::from_millis(200),
            work_root: work_root.into(),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - DATABASE_URL (optional, in-memory store when unset)
    /// - ORCHESTRATOR_BIND_ADDR (optional, default: 0.0.0.0:8080)
    /// - RESYNC_INTERVAL (optional, seconds, default: 30)
    /// - RETRY_MAX_ATTEMPTS (optional, default: 5)
    /// - RETRY_INITIAL_DELAY_MS (optional, default: 200)
    /// - WORK_ROOT (optional, default: ./data/work)
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        config.database_url = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());

        if let Ok(addr) = std::env::var("ORCHESTRATOR_BIND_ADDR") {
            config.bind_addr = addr;
        }

        if let Some(interval) = std::env::var("RESYNC_INTERVAL")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            config.resync_interval = Duration::from_secs(interval);
        }

        if let Some(attempts) = std::env::var("RETRY_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
        {
            config.retry_max_attempts = attempts;
        }

        if let Some(delay) = std::env::var("RETRY_INITIAL_DELAY_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            config.retry_initial_delay = Duration::from_millis(delay);
        }

        if let Ok(root) = std::env::var("WORK_ROOT") {
            config.work_root = PathBuf::from(root);
        }

        config.validate()?;
        Ok(config)
    }

    /// Retry policy the controllers share
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_max_attempts, self.retry_initial_delay)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if self.resync_interval.is_zero() {
            anyhow::bail!("resync_interval must be greater than 0");
        }

        if self.retry_max_attempts == 0 {
            anyhow::bail!("retry_max_attempts must be greater than 0");
        }

        if self.work_root.as_os_str().is_empty() {
            anyhow::bail!("work_root cannot be empty");
        }

        Ok(())
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::new("./data/work")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.resync_interval, Duration::from_secs(30));
        assert!(config.database_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = OrchestratorConfig::default();

        config.resync_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        config.resync_interval = Duration::from_secs(1);
        config.retry_max_attempts = 0;
        assert!(config.validate().is_err());

        config.retry_max_attempts = 3;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_policy_from_config() {
        let mut config = OrchestratorConfig::default();
        config.retry_max_attempts = 7;
        config.retry_initial_delay = Duration::from_millis(50);

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 7);
        assert_eq!(policy.delay_for(2), Duration::from_millis(100));
    }
}
