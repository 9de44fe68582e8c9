//! Resolution poller
//!
//! Lists outstanding tickets on an interval and whenever a ticket changes.
//! Each ticket is resolved in its own task, bounded by a semaphore.

use anyhow::Result;
use gantry_core::domain::{
    Artifact, GitArtifactResolution, Kind, ObjectKey, ResolutionPhase, StorageReference,
};
use gantry_store::{EventType, ObjectStore, StoreExt};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::sync::broadcast::error::RecvError;
use tokio::time;
use tracing::{debug, error, info, warn};

use super::modify;
use crate::config::Config;
use crate::error::ResolveError;
use crate::resolver::{ResolutionRequest, ResolverRegistry};

/// Poller that resolves every ticket not marked `Resolved`
pub struct ResolutionPoller {
    config: Config,
    store: Arc<dyn ObjectStore>,
    resolvers: Arc<ResolverRegistry>,
    semaphore: Arc<Semaphore>,
}

impl ResolutionPoller {
    /// Creates a new resolution poller
    pub fn new(config: Config, store: Arc<dyn ObjectStore>, resolvers: Arc<ResolverRegistry>) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_parallel_resolutions));
        Self {
            config,
            store,
            resolvers,
            semaphore,
        }
    }

    /// Starts the polling loop. Returns once the store stops sending
    /// notifications.
    pub async fn run(&self) -> Result<()> {
        info!(
            resolver = %self.config.resolver_id,
            "Starting resolution poller (interval: {:?})",
            self.config.poll_interval
        );

        let mut events = self.store.watch();
        let mut interval = time::interval(self.config.poll_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                event = events.recv() => match event {
                    Ok(event) if event.kind == Kind::GitArtifactResolution
                        && event.event != EventType::Deleted => {}
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Poller lagged behind notifications");
                    }
                    Err(RecvError::Closed) => {
                        info!("Notification channel closed, stopping poller");
                        return Ok(());
                    }
                },
            }

            match self.poll_once().await {
                Ok(resolved) => {
                    if resolved > 0 {
                        info!("Resolved {} artifact(s) this cycle", resolved);
                    }
                }
                Err(e) => {
                    error!("Error during poll cycle: {}", e);
                }
            }
        }
    }

    /// Performs a single poll cycle and returns how many tickets resolved
    pub async fn poll_once(&self) -> Result<usize, ResolveError> {
        let tickets: Vec<GitArtifactResolution> = self
            .store
            .list_resources::<GitArtifactResolution>(None)
            .await?
            .into_iter()
            .filter(|ticket| !ticket.is_resolved())
            .collect();

        if tickets.is_empty() {
            debug!("No outstanding tickets");
            return Ok(0);
        }

        debug!("Found {} outstanding ticket(s)", tickets.len());

        let mut handles = Vec::new();

        for ticket in tickets {
            let key = ticket.metadata.key();

            // Try to acquire semaphore permit, skip if at max capacity
            let Ok(permit) = self.semaphore.clone().try_acquire_owned() else {
                debug!("Max parallel resolutions reached, skipping {} for now", key);
                continue;
            };

            let store = Arc::clone(&self.store);
            let resolvers = Arc::clone(&self.resolvers);
            let resolver_id = self.config.resolver_id.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                match resolve_ticket(store.as_ref(), &resolvers, &key).await {
                    Ok(resolved) => resolved,
                    Err(e) => {
                        error!(resolver = %resolver_id, ticket = %key, "Resolution failed: {}", e);
                        false
                    }
                }
            }));
        }

        let mut resolved = 0;
        for handle in handles {
            match handle.await {
                Ok(true) => resolved += 1,
                Ok(false) => {}
                Err(e) => warn!("Resolution task panicked: {}", e),
            }
        }

        Ok(resolved)
    }
}

/// Resolves one ticket end to end. Returns true once the ticket is marked
/// `Resolved`. Nothing is written to the Artifact unless the blob is stored.
pub async fn resolve_ticket(
    store: &dyn ObjectStore,
    resolvers: &ResolverRegistry,
    key: &ObjectKey,
) -> Result<bool, ResolveError> {
    let Some(artifact) = store.fetch::<Artifact>(key).await? else {
        debug!(ticket = %key, "Artifact is gone, nothing to resolve");
        return Ok(false);
    };

    let reference = match artifact.status.reference.clone() {
        Some(reference) => reference,
        None => {
            let claimed = modify::<GitArtifactResolution, _>(store, key, |ticket| {
                if ticket.status.phase.is_some() {
                    return false;
                }
                ticket.status.phase = Some(ResolutionPhase::InProgress);
                true
            })
            .await?;
            if claimed {
                info!(ticket = %key, "Resolution in progress");
            }

            let source_type = &artifact.spec.source.source_type;
            let resolver = resolvers
                .find(source_type)
                .ok_or_else(|| ResolveError::Unsupported(source_type.clone()))?;

            let request = ResolutionRequest {
                id: artifact.metadata.name.clone(),
                source_type: source_type.clone(),
                config: artifact.spec.source.config.clone(),
            };
            let reference = resolver.resolve(&request).await?;

            record_reference(store, key, &reference).await?;
            reference
        }
    };

    modify::<GitArtifactResolution, _>(store, key, |ticket| {
        if ticket.is_resolved() {
            return false;
        }
        ticket.status.phase = Some(ResolutionPhase::Resolved);
        ticket.status.reference = Some(reference.clone());
        true
    })
    .await?;

    info!(ticket = %key, id = %reference.id, "Artifact resolved");
    Ok(true)
}

async fn record_reference(
    store: &dyn ObjectStore,
    key: &ObjectKey,
    reference: &StorageReference,
) -> Result<(), ResolveError> {
    modify::<Artifact, _>(store, key, |artifact| {
        if artifact.status.reference.is_some() {
            return false;
        }
        artifact.status.reference = Some(reference.clone());
        true
    })
    .await?;
    Ok(())
}
