//! Controllers
//!
//! One independent, level-triggered control loop per entity kind:
//!
//! - [`PipelineReconciler`]: resolves inputs into Artifacts, sequences Stages
//! - [`StageReconciler`]: creates Tasks and aggregates their phases
//! - [`TaskReconciler`]: submits work to the compute substrate, never twice
//! - [`ArtifactReconciler`]: owns the Artifact phase, requests resolution
//!
//! Each loop is driven by store notifications and a periodic resync. Keys
//! are coalesced while waiting, so a burst of events costs one pass.

mod artifact;
mod error;
mod pipeline;
mod retry;
mod stage;
mod task;

pub use artifact::ArtifactReconciler;
pub use error::{ReconcileError, ReconcileResult};
pub use pipeline::{ArtifactReferenceMapper, PipelineReconciler, TemplateReferenceMapper};
pub use retry::RetryPolicy;
pub use stage::StageReconciler;
pub use task::{TaskReconciler, job_spec};

use async_trait::async_trait;
use gantry_core::domain::{Kind, ObjectKey};
use gantry_store::{EventType, ObjectStore, StoreError, WatchEvent};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::source::SourceRegistry;
use crate::substrate::ComputeSubstrate;

/// Shared context for controllers.
#[derive(Clone)]
pub struct ControllerContext {
    pub store: Arc<dyn ObjectStore>,
    pub sources: Arc<SourceRegistry>,
    pub substrate: Arc<dyn ComputeSubstrate>,
}

impl ControllerContext {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        sources: Arc<SourceRegistry>,
        substrate: Arc<dyn ComputeSubstrate>,
    ) -> Self {
        Self {
            store,
            sources,
            substrate,
        }
    }
}

/// Maps a change on some other kind to the keys a controller should visit
#[async_trait]
pub trait KeyMapper: Send + Sync {
    async fn map(&self, event: &WatchEvent) -> Result<Vec<ObjectKey>, StoreError>;
}

/// Extra events, beyond its own kind, that wake a controller
#[derive(Clone)]
pub enum Trigger {
    /// Changes to objects of this kind enqueue their owner
    Owned(Kind),
    /// Changes to objects of this kind enqueue whatever the mapper returns
    Mapped(Kind, Arc<dyn KeyMapper>),
}

#[async_trait]
pub trait Reconciler: Send + Sync {
    fn kind(&self) -> Kind;

    fn triggers(&self) -> Vec<Trigger> {
        Vec::new()
    }

    /// Converges one object. Must tolerate the object being gone and must
    /// perform no writes when nothing changed.
    async fn reconcile(&self, key: &ObjectKey) -> ReconcileResult<()>;
}

// =============================================================================
// Work Queue
// =============================================================================

/// Ordered, de-duplicated set of keys waiting for a pass
#[derive(Debug, Default)]
pub struct WorkQueue {
    pending: BTreeSet<ObjectKey>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the key was already pending
    pub fn push(&mut self, key: ObjectKey) -> bool {
        self.pending.insert(key)
    }

    pub fn pop(&mut self) -> Option<ObjectKey> {
        self.pending.pop_first()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

// =============================================================================
// Controller Loop
// =============================================================================

pub struct Controller {
    reconciler: Arc<dyn Reconciler>,
    store: Arc<dyn ObjectStore>,
    triggers: Vec<Trigger>,
    retry: RetryPolicy,
    resync_interval: Duration,
}

impl Controller {
    pub fn new(
        reconciler: Arc<dyn Reconciler>,
        store: Arc<dyn ObjectStore>,
        retry: RetryPolicy,
        resync_interval: Duration,
    ) -> Self {
        let triggers = reconciler.triggers();
        Self {
            reconciler,
            store,
            triggers,
            retry,
            resync_interval,
        }
    }

    /// Runs until the store's notification channel closes
    pub async fn run(self) {
        let kind = self.reconciler.kind();
        let mut events = self.store.watch();
        let mut queue = WorkQueue::new();
        let mut ticker = time::interval(self.resync_interval);

        info!(%kind, "Starting controller (resync: {:?})", self.resync_interval);

        loop {
            while let Some(key) = queue.pop() {
                self.reconcile_key(&key).await;

                loop {
                    match events.try_recv() {
                        Ok(event) => self.enqueue_for(&event, &mut queue).await,
                        Err(TryRecvError::Lagged(skipped)) => {
                            warn!(%kind, skipped, "Controller lagged behind notifications, resyncing");
                            self.resync(&mut queue).await;
                        }
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Closed) => return,
                    }
                }
            }

            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => self.enqueue_for(&event, &mut queue).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(%kind, skipped, "Controller lagged behind notifications, resyncing");
                        self.resync(&mut queue).await;
                    }
                    Err(RecvError::Closed) => {
                        info!(%kind, "Notification channel closed, stopping controller");
                        return;
                    }
                },
                _ = ticker.tick() => self.resync(&mut queue).await,
            }
        }
    }

    async fn reconcile_key(&self, key: &ObjectKey) {
        let kind = self.reconciler.kind();
        let what = format!("reconcile {} {}", kind, key);
        let reconciler = &self.reconciler;

        if let Err(e) = self.retry.run(&what, || reconciler.reconcile(key)).await {
            if e.is_transient() {
                error!(%kind, %key, "Reconcile failed after retries: {}", e);
            } else {
                error!(%kind, %key, "Reconcile failed: {}", e);
            }
        }
    }

    /// Enqueues the keys an event concerns for this controller
    pub async fn enqueue_for(&self, event: &WatchEvent, queue: &mut WorkQueue) {
        let own_kind = self.reconciler.kind();

        if event.kind == own_kind {
            if event.event != EventType::Deleted {
                queue.push(event.key.clone());
            }
            return;
        }

        for trigger in &self.triggers {
            match trigger {
                Trigger::Owned(kind) if *kind == event.kind => {
                    if let Some((owner_kind, owner_key)) = event.owner_key() {
                        if owner_kind == own_kind {
                            queue.push(owner_key);
                        }
                    }
                }
                Trigger::Mapped(kind, mapper) if *kind == event.kind => {
                    match mapper.map(event).await {
                        Ok(keys) => {
                            for key in keys {
                                queue.push(key);
                            }
                        }
                        Err(e) => warn!(kind = %own_kind, "Failed to map {} event: {}", event.kind, e),
                    }
                }
                _ => {}
            }
        }
    }

    async fn resync(&self, queue: &mut WorkQueue) {
        let kind = self.reconciler.kind();
        match self.store.list(kind, None).await {
            Ok(objects) => {
                for object in objects {
                    queue.push(object.key());
                }
                debug!(%kind, pending = queue.len(), "Resync");
            }
            Err(e) => warn!(%kind, "Resync failed: {}", e),
        }
    }
}

// =============================================================================
// Manager
// =============================================================================

/// Starts one controller task per reconciler
pub struct ControllerManager {
    context: ControllerContext,
    retry: RetryPolicy,
    resync_interval: Duration,
}

impl ControllerManager {
    pub fn new(context: ControllerContext, retry: RetryPolicy, resync_interval: Duration) -> Self {
        Self {
            context,
            retry,
            resync_interval,
        }
    }

    pub fn reconcilers(&self) -> Vec<Arc<dyn Reconciler>> {
        vec![
            Arc::new(PipelineReconciler::new(self.context.clone())),
            Arc::new(StageReconciler::new(self.context.clone())),
            Arc::new(TaskReconciler::new(self.context.clone())),
            Arc::new(ArtifactReconciler::new(self.context.clone())),
        ]
    }

    pub fn start(&self) -> Vec<JoinHandle<()>> {
        self.reconcilers()
            .into_iter()
            .map(|reconciler| {
                let controller = Controller::new(
                    reconciler,
                    self.context.store.clone(),
                    self.retry.clone(),
                    self.resync_interval,
                );
                tokio::spawn(controller.run())
            })
            .collect()
    }
}
