//! Pipeline reconciler
//!
//! Turns each pipeline input into a content-addressed Artifact, waits for
//! every Artifact to resolve, then creates Stages one at a time in template
//! order, each only after its predecessor completed.

use async_trait::async_trait;
use gantry_core::domain::{
    Artifact, ArtifactRef, ArtifactSource, ArtifactSpec, Kind, ObjectKey, ObjectMeta, Ordinal,
    Phase, Pipeline, PipelineInput, Stage, StageSpec, WorkflowTemplate,
};
use gantry_core::identity::{
    SOURCE_CONFIG_HASH_LABEL, SOURCE_TYPE_LABEL, artifact_name, content_hash, stage_name,
};
use gantry_store::{ObjectStore, StoreError, StoreExt, WatchEvent};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{ControllerContext, KeyMapper, ReconcileError, ReconcileResult, Reconciler, Trigger};

pub struct PipelineReconciler {
    ctx: ControllerContext,
}

impl PipelineReconciler {
    pub fn new(ctx: ControllerContext) -> Self {
        Self { ctx }
    }

    /// Source type an input resolves with: its own, or the template's when
    /// left empty. The two must agree when both are set.
    fn effective_type<'a>(
        name: &str,
        declared: &'a str,
        input: &'a PipelineInput,
    ) -> ReconcileResult<&'a str> {
        if input.source_type.is_empty() || input.source_type == declared {
            Ok(declared)
        } else {
            Err(ReconcileError::InvalidConfig(format!(
                "input '{}' has type '{}' but the template declares '{}'",
                name, input.source_type, declared
            )))
        }
    }

    /// Builds the Artifact an input resolves to and gets or creates it
    async fn ensure_artifact(
        &self,
        pipeline: &Pipeline,
        source_type: &str,
        config: String,
    ) -> ReconcileResult<Artifact> {
        let name = artifact_name(source_type, &config);
        let artifact = Artifact {
            metadata: ObjectMeta::new(pipeline.metadata.namespace.clone(), name)
                .with_owner(Kind::Pipeline, pipeline.metadata.name.clone())
                .with_label(SOURCE_TYPE_LABEL, source_type)
                .with_label(SOURCE_CONFIG_HASH_LABEL, content_hash(config.as_bytes())),
            spec: ArtifactSpec {
                source: ArtifactSource {
                    source_type: source_type.to_string(),
                    config,
                },
            },
            status: Default::default(),
        };

        let (artifact, created) = self.ctx.store.get_or_create(artifact).await?;
        if created {
            info!(
                pipeline = %pipeline.metadata.key(),
                artifact = %artifact.metadata.name,
                "Created artifact"
            );
        }
        Ok(artifact)
    }

    /// Walks template stages in order, creating at most one new Stage.
    /// Returns true once every stage is complete.
    async fn sequence_stages(
        &self,
        pipeline: &Pipeline,
        template: &WorkflowTemplate,
    ) -> ReconcileResult<bool> {
        let key = pipeline.metadata.key();

        for stage_config in &template.spec.stages {
            let ordinal = Ordinal::FIRST;
            let stage = Stage {
                metadata: ObjectMeta::new(
                    key.namespace.clone(),
                    stage_name(&key.name, &stage_config.name, ordinal),
                )
                .with_owner(Kind::Pipeline, key.name.clone()),
                spec: StageSpec {
                    pipeline: key.name.clone(),
                    template_stage: stage_config.name.clone(),
                    ordinal,
                    config: stage_config.clone(),
                },
                status: Default::default(),
            };

            let (stage, created) = self.ctx.store.get_or_create(stage).await?;
            if created {
                info!(pipeline = %key, stage = %stage.metadata.name, "Created stage");
                return Ok(false);
            }
            if !stage.is_for(&key.name, &stage_config.name, ordinal) {
                return Err(ReconcileError::InvalidConfig(format!(
                    "stage {} belongs to pipeline '{}' stage '{}', not to pipeline {}",
                    stage.metadata.name, stage.spec.pipeline, stage.spec.template_stage, key
                )));
            }

            match stage.status.phase {
                Some(Phase::Complete) => continue,
                phase => {
                    debug!(
                        pipeline = %key,
                        stage = %stage.metadata.name,
                        ?phase,
                        "Waiting on stage"
                    );
                    return Ok(false);
                }
            }
        }

        Ok(true)
    }
}

#[async_trait]
impl Reconciler for PipelineReconciler {
    fn kind(&self) -> Kind {
        Kind::Pipeline
    }

    fn triggers(&self) -> Vec<Trigger> {
        let store = self.ctx.store.clone();
        vec![
            Trigger::Owned(Kind::Stage),
            Trigger::Mapped(
                Kind::Artifact,
                Arc::new(ArtifactReferenceMapper::new(store.clone())),
            ),
            Trigger::Mapped(
                Kind::WorkflowTemplate,
                Arc::new(TemplateReferenceMapper::new(store)),
            ),
        ]
    }

    async fn reconcile(&self, key: &ObjectKey) -> ReconcileResult<()> {
        let Some(pipeline) = self.ctx.store.fetch::<Pipeline>(key).await? else {
            debug!(pipeline = %key, "Pipeline no longer exists");
            return Ok(());
        };

        let template_key = ObjectKey::new(key.namespace.clone(), pipeline.spec.template_name.clone());
        let template = self
            .ctx
            .store
            .fetch::<WorkflowTemplate>(&template_key)
            .await?
            .ok_or_else(|| ReconcileError::MissingTemplate(template_key.clone()))?;

        if let Some(missing) = template
            .spec
            .inputs
            .keys()
            .find(|name| !pipeline.spec.inputs.contains_key(*name))
        {
            return Err(ReconcileError::InvalidConfig(format!(
                "pipeline {} does not provide template input '{}'",
                key, missing
            )));
        }

        for (name, input) in &pipeline.spec.inputs {
            let declared = template.input(name).ok_or_else(|| ReconcileError::UnknownInput {
                input: name.clone(),
                template: template_key.to_string(),
            })?;
            let source_type = Self::effective_type(name, &declared.source_type, input)?;
            let source = self
                .ctx
                .sources
                .find(source_type)
                .ok_or_else(|| ReconcileError::UnknownInputType(source_type.to_string()))?;

            match &input.artifact_ref {
                None => {
                    let config = source.canonical_config(&declared.config, &input.config)?;
                    let artifact = self.ensure_artifact(&pipeline, source_type, config).await?;

                    let mut updated = pipeline.clone();
                    if let Some(slot) = updated.spec.inputs.get_mut(name) {
                        slot.artifact_ref = Some(ArtifactRef {
                            name: artifact.metadata.name.clone(),
                        });
                    }
                    self.ctx.store.update_resource(updated).await?;

                    info!(
                        pipeline = %key,
                        input = %name,
                        artifact = %artifact.metadata.name,
                        "Bound input to artifact"
                    );
                    return Ok(());
                }
                Some(reference) => {
                    let artifact_key = ObjectKey::new(key.namespace.clone(), reference.name.clone());
                    match self.ctx.store.fetch::<Artifact>(&artifact_key).await? {
                        Some(artifact) if artifact.is_resolved() => {}
                        Some(_) => {
                            debug!(pipeline = %key, artifact = %reference.name, "Waiting on artifact");
                            return Ok(());
                        }
                        None => {
                            // Shared artifacts die with the pipeline that created them
                            let config = source.canonical_config(&declared.config, &input.config)?;
                            if artifact_name(source_type, &config) != reference.name {
                                return Err(ReconcileError::InvalidConfig(format!(
                                    "input '{}' no longer matches artifact {}",
                                    name, reference.name
                                )));
                            }
                            warn!(pipeline = %key, artifact = %reference.name, "Referenced artifact is gone, recreating");
                            self.ensure_artifact(&pipeline, source_type, config).await?;
                            return Ok(());
                        }
                    }
                }
            }
        }

        if self.sequence_stages(&pipeline, &template).await? {
            debug!(pipeline = %key, "All stages complete");
        }

        Ok(())
    }
}

// =============================================================================
// Key Mappers
// =============================================================================

/// Artifact change → every pipeline in the namespace that references it
pub struct ArtifactReferenceMapper {
    store: Arc<dyn ObjectStore>,
}

impl ArtifactReferenceMapper {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl KeyMapper for ArtifactReferenceMapper {
    async fn map(&self, event: &WatchEvent) -> Result<Vec<ObjectKey>, StoreError> {
        let pipelines = self
            .store
            .list_resources::<Pipeline>(Some(&event.key.namespace))
            .await?;

        let mut keys: Vec<ObjectKey> = pipelines
            .iter()
            .filter(|p| p.references_artifact(&event.key.name))
            .map(|p| p.metadata.key())
            .collect();

        if let Some((Kind::Pipeline, owner)) = event.owner_key() {
            if !keys.contains(&owner) {
                keys.push(owner);
            }
        }

        Ok(keys)
    }
}

/// Template change → every pipeline in the namespace built from it
pub struct TemplateReferenceMapper {
    store: Arc<dyn ObjectStore>,
}

impl TemplateReferenceMapper {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl KeyMapper for TemplateReferenceMapper {
    async fn map(&self, event: &WatchEvent) -> Result<Vec<ObjectKey>, StoreError> {
        let pipelines = self
            .store
            .list_resources::<Pipeline>(Some(&event.key.namespace))
            .await?;

        Ok(pipelines
            .into_iter()
            .filter(|p| p.spec.template_name == event.key.name)
            .map(|p| p.metadata.key())
            .collect())
    }
}
