//! Gantry Orchestrator
//!
//! Serves the declaration API and runs the controllers in one process.

use anyhow::{Context, Result};
use gantry_orchestrator::controller::{ControllerContext, ControllerManager};
use gantry_orchestrator::source::SourceRegistry;
use gantry_orchestrator::substrate::{PodmanSubstrate, podman::check_podman_available};
use gantry_orchestrator::{OrchestratorConfig, create_router};
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
                .unwrap_or_else(|_| "gantry_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Gantry Orchestrator...");

    let config = load_config();
    info!(
        "Loaded configuration: resync={:?}, retries={}, work_root={}",
        config.resync_interval,
        config.retry_max_attempts,
        config.work_root.display()
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
            warn!("DATABASE_URL not set, keeping all state in memory");
            Arc::new(MemoryStore::new())
        }
    };

    check_podman_available()
        .await
        .context("Podman is required to run tasks")?;

    tokio::fs::create_dir_all(&config.work_root)
        .await
        .with_context(|| format!("Failed to create work root {}", config.work_root.display()))?;

    let substrate = Arc::new(PodmanSubstrate::new(store.clone(), config.work_root.clone()));
    let resumed = substrate
        .resume()
        .await
        .context("Failed to resume running jobs")?;
    if resumed > 0 {
        info!("Resumed {} running job(s)", resumed);
    }

    let context = ControllerContext::new(
        store.clone(),
        Arc::new(SourceRegistry::with_defaults()),
        substrate,
    );
    let manager = ControllerManager::new(context, config.retry_policy(), config.resync_interval);
    let controllers = manager.start();
    info!("Started {} controllers", controllers.len());

    let app = create_router(store);

    info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Failed to start server")?;

    info!("Shutting down controllers...");
    for controller in controllers {
        controller.abort();
    }

    Ok(())
}

/// Loads configuration from environment, falling back to defaults
fn load_config() -> OrchestratorConfig {
    match OrchestratorConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load config from environment: {}", e);
            warn!("Using default configuration");
            OrchestratorConfig::default()
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
