//! Gantry Storage Service
//!
//! Serves blobs over HTTP. The index lives in PostgreSQL when
//! `DATABASE_URL` is set and in memory otherwise.

use anyhow::{Context, Result};
use gantry_storage::{BlobStore, StorageConfig, StorageService, create_router};
use gantry_store::{MemoryStore, ObjectStore, PgStore};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gantry_storage=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Gantry Storage...");

    let config = load_config();
    info!(
        "Loaded configuration: root={}, namespace={}",
        config.root.display(),
        config.namespace
    );

    let store: Arc<dyn ObjectStore> = match &config.database_url {
        Some(url) => {
            info!("Connecting to database...");
            Arc::new(
                PgStore::connect(url)
                    .await
                    .context("Failed to connect to database")?,
            )
        }
        None => {
            warn!("DATABASE_URL not set, keeping the blob index in memory");
            Arc::new(MemoryStore::new())
        }
    };

    tokio::fs::create_dir_all(&config.root)
        .await
        .with_context(|| format!("Failed to create storage root {}", config.root.display()))?;

    let service = Arc::new(StorageService::new(
        store,
        BlobStore::new(config.root.clone()),
        config.namespace.clone(),
    ));
    let app = create_router(service, config.max_upload_bytes);

    info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}

/// Loads configuration from environment, falling back to defaults
fn load_config() -> StorageConfig {
    match StorageConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load config from environment: {}", e);
            warn!("Using default configuration");
            StorageConfig::default()
        }
    }
}
