//! Artifact reconciler
//!
//! Recomputes the artifact phase from its source and reference on every
//! pass, and asks the matching source to resolve unresolved artifacts.

use async_trait::async_trait;
use gantry_core::domain::{Artifact, ArtifactPhase, Kind, ObjectKey};
use gantry_store::StoreExt;
use tracing::{debug, info};

use super::{ControllerContext, ReconcileError, ReconcileResult, Reconciler, Trigger};

pub struct ArtifactReconciler {
    ctx: ControllerContext,
}

impl ArtifactReconciler {
    pub fn new(ctx: ControllerContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Reconciler for ArtifactReconciler {
    fn kind(&self) -> Kind {
        Kind::Artifact
    }

    fn triggers(&self) -> Vec<Trigger> {
        vec![Trigger::Owned(Kind::GitArtifactResolution)]
    }

    async fn reconcile(&self, key: &ObjectKey) -> ReconcileResult<()> {
        let Some(mut artifact) = self.ctx.store.fetch::<Artifact>(key).await? else {
            debug!(artifact = %key, "Artifact no longer exists");
            return Ok(());
        };

        let derived = ArtifactPhase::derive(&artifact.spec.source, artifact.status.reference.as_ref());
        if let Some(phase) = ArtifactPhase::advance(artifact.status.phase, derived) {
            let previous = artifact.status.phase;
            artifact.status.phase = Some(phase);
            artifact = self.ctx.store.update_resource(artifact).await?;
            info!(artifact = %key, ?previous, %phase, "Artifact phase changed");
        }

        if artifact.status.phase != Some(ArtifactPhase::Unresolved) {
            return Ok(());
        }

        let source_type = &artifact.spec.source.source_type;
        let source = self
            .ctx
            .sources
            .find(source_type)
            .ok_or_else(|| ReconcileError::UnknownSourceType(source_type.clone()))?;

        source
            .request_resolution(self.ctx.store.as_ref(), &artifact)
            .await
    }
}
