//! Pipeline Service
//!
//! Business logic for workflow templates and pipeline runs. Creation only
//! validates and records the declaration; the controllers do the rest.

use gantry_core::domain::{
    Kind, ObjectKey, ObjectMeta, Pipeline, PipelineInput, PipelineSpec, Stage, WorkflowTemplate,
};
use gantry_core::dto::pipeline::{CreatePipeline, CreateTemplate, StageSummary};
use gantry_store::{ObjectStore, StoreError, StoreExt, cascade_delete};
use std::collections::BTreeSet;

/// Service error type
#[derive(Debug)]
pub enum PipelineError {
    NotFound(String),
    ValidationError(String),
    Conflict(String),
    StoreError(StoreError),
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        PipelineError::StoreError(err)
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

// =============================================================================
// Templates
// =============================================================================

/// Register a workflow template
pub async fn create_template(store: &dyn ObjectStore, req: CreateTemplate) -> Result<WorkflowTemplate> {
    validate_template_request(&req)?;

    let template = WorkflowTemplate {
        metadata: ObjectMeta::new(req.namespace, req.name),
        spec: req.spec,
    };

    let template = store.create_resource(template).await.map_err(|e| {
        if e.is_already_exists() {
            PipelineError::Conflict(e.to_string())
        } else {
            e.into()
        }
    })?;

    tracing::info!("Workflow template created: {}", template.metadata.key());

    Ok(template)
}

/// Get a workflow template
pub async fn get_template(store: &dyn ObjectStore, key: &ObjectKey) -> Result<WorkflowTemplate> {
    store
        .fetch::<WorkflowTemplate>(key)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("Workflow template {} not found", key)))
}

// =============================================================================
// Pipelines
// =============================================================================

/// Start a pipeline run from an existing template
pub async fn create_pipeline(store: &dyn ObjectStore, req: CreatePipeline) -> Result<Pipeline> {
    validate_name("Namespace", &req.namespace)?;
    validate_name("Pipeline", &req.name)?;

    let template_key = ObjectKey::new(req.namespace.clone(), req.template_name.clone());
    let template = store
        .fetch::<WorkflowTemplate>(&template_key)
        .await?
        .ok_or_else(|| {
            PipelineError::ValidationError(format!("Workflow template {} not found", template_key))
        })?;

    validate_inputs(&template, &req)?;

    let inputs = req
        .inputs
        .into_iter()
        .map(|(name, input)| {
            (
                name,
                PipelineInput {
                    source_type: input.source_type,
                    config: input.config,
                    artifact_ref: None,
                },
            )
        })
        .collect();

    let pipeline = Pipeline {
        metadata: ObjectMeta::new(req.namespace, req.name),
        spec: PipelineSpec {
            template_name: req.template_name,
            inputs,
        },
    };

    let pipeline = store.create_resource(pipeline).await.map_err(|e| {
        if e.is_already_exists() {
            PipelineError::Conflict(e.to_string())
        } else {
            e.into()
        }
    })?;

    tracing::info!(
        "Pipeline created: {} (template {})",
        pipeline.metadata.key(),
        pipeline.spec.template_name
    );

    Ok(pipeline)
}

/// Get a pipeline
pub async fn get_pipeline(store: &dyn ObjectStore, key: &ObjectKey) -> Result<Pipeline> {
    store
        .fetch::<Pipeline>(key)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("Pipeline {} not found", key)))
}

/// Stages created for a pipeline so far
pub async fn list_stages(store: &dyn ObjectStore, key: &ObjectKey) -> Result<Vec<StageSummary>> {
    get_pipeline(store, key).await?;

    let stages = store.list_owned::<Stage>(Kind::Pipeline, key).await?;
    Ok(stages.into_iter().map(StageSummary::from).collect())
}

/// Delete a pipeline and everything it owns
pub async fn delete_pipeline(store: &dyn ObjectStore, key: &ObjectKey) -> Result<usize> {
    get_pipeline(store, key).await?;

    let deleted = cascade_delete(store, Kind::Pipeline, key).await?;

    tracing::info!("Pipeline deleted: {} ({} objects removed)", key, deleted);

    Ok(deleted)
}

// =============================================================================
// Validation
// =============================================================================

/// Names end up inside derived Stage, Task and container names, so they are
/// limited to lowercase alphanumerics and '-'. The derived-name separator is
/// never allowed.
pub(crate) fn validate_name(what: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(PipelineError::ValidationError(format!(
            "{} name cannot be empty",
            what
        )));
    }

    if name.len() > 63 {
        return Err(PipelineError::ValidationError(format!(
            "{} name is too long (max 63 characters)",
            what
        )));
    }

    let valid = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && name.starts_with(|c: char| c.is_ascii_alphanumeric());
    if !valid {
        return Err(PipelineError::ValidationError(format!(
            "{} name '{}' must be lowercase alphanumerics or '-'",
            what, name
        )));
    }

    Ok(())
}

fn validate_template_request(req: &CreateTemplate) -> Result<()> {
    validate_name("Namespace", &req.namespace)?;
    validate_name("Template", &req.name)?;

    for (name, input) in &req.spec.inputs {
        if input.source_type.trim().is_empty() {
            return Err(PipelineError::ValidationError(format!(
                "Input '{}' has no type",
                name
            )));
        }
    }

    let mut seen = BTreeSet::new();
    for stage in &req.spec.stages {
        validate_name("Stage", &stage.name)?;
        if !seen.insert(stage.name.as_str()) {
            return Err(PipelineError::ValidationError(format!(
                "Stage '{}' is declared twice",
                stage.name
            )));
        }

        for (task_name, task) in &stage.tasks {
            validate_name("Task", task_name)?;
            if task.image.trim().is_empty() {
                return Err(PipelineError::ValidationError(format!(
                    "Task '{}' in stage '{}' has no image",
                    task_name, stage.name
                )));
            }
        }
    }

    Ok(())
}

fn validate_inputs(template: &WorkflowTemplate, req: &CreatePipeline) -> Result<()> {
    for name in template.spec.inputs.keys() {
        if !req.inputs.contains_key(name) {
            return Err(PipelineError::ValidationError(format!(
                "Missing value for template input '{}'",
                name
            )));
        }
    }

    for (name, input) in &req.inputs {
        let Some(declared) = template.input(name) else {
            return Err(PipelineError::ValidationError(format!(
                "Template {} does not declare input '{}'",
                template.metadata.name, name
            )));
        };

        if !input.source_type.is_empty() && input.source_type != declared.source_type {
            return Err(PipelineError::ValidationError(format!(
                "Input '{}' has type '{}' but the template declares '{}'",
                name, input.source_type, declared.source_type
            )));
        }
    }

    Ok(())
}
