//! Gantry Resolver
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Store: the PostgreSQL object store shared with the orchestrator
//! - Resolvers: one per source type, selected from a registry
//! - Scheduler: ticket polling and result recording, git source polling
//!
//! The storage service must be reachable before any ticket is picked up.

use anyhow::{Context, Result};
use gantry_client::StorageClient;
use gantry_resolver::{Config, GitResolver, ResolutionPoller, ResolverRegistry, SourcePoller};
use gantry_store::PgStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gantry_resolver=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Gantry Resolver");

    // Load configuration
    let config = load_config()?;
    info!(
        "Loaded configuration: resolver_id={}, storage_url={}",
        config.resolver_id, config.storage_url
    );

    info!("Connecting to database...");
    let store = Arc::new(
        PgStore::connect(&config.database_url)
            .await
            .context("Failed to connect to database")?,
    );

    let storage = Arc::new(StorageClient::new(config.storage_url.clone()));
    wait_for_storage(&storage).await?;
    info!("Storage service reachable");

    let mut resolvers = ResolverRegistry::new();
    resolvers.register(Arc::new(GitResolver::new(storage)));

    let sources = SourcePoller::new(&config, store.clone());
    let poller = ResolutionPoller::new(config.clone(), store, Arc::new(resolvers));

    info!(
        "Poll interval: {:?}, max parallel resolutions: {}, source poll interval: {:?}",
        config.poll_interval, config.max_parallel_resolutions, config.source_poll_interval
    );

    let result = tokio::select! {
        result = poller.run() => result,
        result = sources.run() => result,
    };
    if let Err(e) = result {
        error!("Poller error: {}", e);
        return Err(e);
    }

    Ok(())
}

/// Loads configuration from environment variables with fallback to defaults
fn load_config() -> Result<Config> {
    match Config::from_env() {
        Ok(config) => {
            config.validate()?;
            Ok(config)
        }
        Err(e) => {
            warn!("Failed to load config from environment ({}), using defaults", e);
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}

/// Waits for the storage service with exponential backoff
///
/// The resolver usually starts alongside the storage service and may come
/// up first.
async fn wait_for_storage(storage: &StorageClient) -> Result<()> {
    const MAX_RETRIES: u32 = 10;
    const INITIAL_DELAY_MS: u64 = 500;
    const MAX_DELAY_MS: u64 = 30_000;

    let mut attempt = 0;
    let mut delay_ms = INITIAL_DELAY_MS;

    loop {
        attempt += 1;

        match storage.health().await {
            Ok(()) => {
                if attempt > 1 {
                    info!("Storage service answered after {} attempt(s)", attempt);
                }
                return Ok(());
            }
            Err(e) => {
                if attempt >= MAX_RETRIES {
                    error!("Storage service unreachable after {} attempts", MAX_RETRIES);
                    return Err(anyhow::anyhow!("Storage service unreachable: {}", e));
                }

                warn!(
                    "Storage service not ready (attempt {}/{}): {}",
                    attempt, MAX_RETRIES, e
                );
                warn!("Retrying in {} ms...", delay_ms);

                tokio::time::sleep(Duration::from_millis(delay_ms)).await;

                delay_ms = (delay_ms * 2).min(MAX_DELAY_MS);
            }
        }
    }
}
