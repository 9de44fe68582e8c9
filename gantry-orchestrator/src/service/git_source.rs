//! Git Source Service
//!
//! Registers the branches the resolver polls. Pipelines started for new
//! commits are owned by their source and go away with it.

use gantry_core::domain::{
    GIT_SOURCE_TYPE, GitSource, Kind, ObjectKey, ObjectMeta, RepoConfig, WorkflowTemplate,
};
use gantry_core::dto::pipeline::CreateGitSource;
use gantry_store::{ObjectStore, StoreExt, cascade_delete};

use super::pipeline::{PipelineError, Result, validate_name};

/// Register a git source
pub async fn create_git_source(
    store: &dyn ObjectStore,
    req: CreateGitSource,
) -> Result<GitSource> {
    validate_name("Namespace", &req.namespace)?;
    validate_name("Git source", &req.name)?;
    validate_repository(&req)?;

    let template_key = ObjectKey::new(
        req.namespace.clone(),
        req.spec.trigger.template_name.clone(),
    );
    let template = store
        .fetch::<WorkflowTemplate>(&template_key)
        .await?
        .ok_or_else(|| {
            PipelineError::ValidationError(format!("Workflow template {} not found", template_key))
        })?;
    validate_trigger(&template, &req)?;

    let source = GitSource {
        metadata: ObjectMeta::new(req.namespace, req.name),
        spec: req.spec,
        status: Default::default(),
    };

    let source = store.create_resource(source).await.map_err(|e| {
        if e.is_already_exists() {
            PipelineError::Conflict(e.to_string())
        } else {
            e.into()
        }
    })?;

    tracing::info!(
        "Git source created: {} ({} branch {})",
        source.metadata.key(),
        source.spec.repository.url,
        source.spec.repository.branch
    );

    Ok(source)
}

/// Get a git source
pub async fn get_git_source(store: &dyn ObjectStore, key: &ObjectKey) -> Result<GitSource> {
    store
        .fetch::<GitSource>(key)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("Git source {} not found", key)))
}

/// All git sources in a namespace, ordered by name
pub async fn list_git_sources(store: &dyn ObjectStore, namespace: &str) -> Result<Vec<GitSource>> {
    Ok(store.list_resources::<GitSource>(Some(namespace)).await?)
}

/// Stop watching a branch and delete the pipelines it started
pub async fn delete_git_source(store: &dyn ObjectStore, key: &ObjectKey) -> Result<usize> {
    get_git_source(store, key).await?;

    let deleted = cascade_delete(store, Kind::GitSource, key).await?;

    tracing::info!("Git source deleted: {} ({} objects removed)", key, deleted);

    Ok(deleted)
}

fn validate_repository(req: &CreateGitSource) -> Result<()> {
    let repository = &req.spec.repository;

    if repository.url.trim().is_empty() {
        return Err(PipelineError::ValidationError(
            "Repository url cannot be empty".to_string(),
        ));
    }
    if repository.url.starts_with('-') {
        return Err(PipelineError::ValidationError(format!(
            "Repository url '{}' cannot start with '-'",
            repository.url
        )));
    }

    let branch = &repository.branch;
    if branch.is_empty() || branch.starts_with('-') || branch.contains(char::is_whitespace) {
        return Err(PipelineError::ValidationError(format!(
            "Branch '{}' is not a valid branch name",
            branch
        )));
    }

    if req.spec.poll.interval_minutes == Some(0) {
        return Err(PipelineError::ValidationError(
            "Poll interval must be at least one minute".to_string(),
        ));
    }

    Ok(())
}

/// Pipelines started by a source only carry the commit, so the trigger input
/// must already name this repository.
fn validate_trigger(template: &WorkflowTemplate, req: &CreateGitSource) -> Result<()> {
    let input = &req.spec.trigger.input;
    let Some(declared) = template.input(input) else {
        return Err(PipelineError::ValidationError(format!(
            "Template {} does not declare input '{}'",
            template.metadata.name, input
        )));
    };

    if declared.source_type != GIT_SOURCE_TYPE {
        return Err(PipelineError::ValidationError(format!(
            "Input '{}' has type '{}', git sources need '{}'",
            input, declared.source_type, GIT_SOURCE_TYPE
        )));
    }

    let repo: RepoConfig = serde_json::from_value(declared.config.clone()).map_err(|e| {
        PipelineError::ValidationError(format!("Input '{}' has no repository: {}", input, e))
    })?;
    if repo.repository != req.spec.repository.url {
        return Err(PipelineError::ValidationError(format!(
            "Input '{}' uses repository {}, not {}",
            input, repo.repository, req.spec.repository.url
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::pipeline_service;
    use gantry_core::domain::{
        GitCloneOptions, GitRepositoryOptions, GitSourceSpec, GitSourceTrigger, InputConfig,
        Pipeline, PollOptions, WorkflowSpec,
    };
    use gantry_core::dto::pipeline::CreateTemplate;
    use gantry_store::MemoryStore;
    use serde_json::json;
    use std::collections::BTreeMap;

    const REPO: &str = "https://example.com/app.git";

    async fn store_with_template() -> MemoryStore {
        let store = MemoryStore::new();
        let mut inputs = BTreeMap::new();
        inputs.insert(
            "src".to_string(),
            InputConfig {
                source_type: "git".to_string(),
                config: json!({ "repository": REPO }),
            },
        );
        let template = CreateTemplate {
            namespace: "default".to_string(),
            name: "ci".to_string(),
            spec: WorkflowSpec {
                inputs,
                stages: Vec::new(),
            },
        };
        pipeline_service::create_template(&store, template).await.unwrap();
        store
    }

    fn request(name: &str, url: &str, input: &str) -> CreateGitSource {
        CreateGitSource {
            namespace: "default".to_string(),
            name: name.to_string(),
            spec: GitSourceSpec {
                repository: GitRepositoryOptions {
                    url: url.to_string(),
                    branch: "main".to_string(),
                },
                clone: GitCloneOptions::default(),
                poll: PollOptions::default(),
                trigger: GitSourceTrigger {
                    template_name: "ci".to_string(),
                    input: input.to_string(),
                },
            },
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let store = store_with_template().await;
        let source = create_git_source(&store, request("app", REPO, "src")).await.unwrap();
        assert!(source.status.last_commit_sha.is_none());

        let again = create_git_source(&store, request("app", REPO, "src")).await;
        assert!(matches!(again, Err(PipelineError::Conflict(_))));

        let listed = list_git_sources(&store, "default").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(list_git_sources(&store, "other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_trigger_must_match_template() {
        let store = store_with_template().await;

        let other_repo = request("a", "https://example.com/x.git", "src");
        let other_repo = create_git_source(&store, other_repo).await;
        assert!(matches!(other_repo, Err(PipelineError::ValidationError(_))));

        let no_input = create_git_source(&store, request("b", REPO, "docs")).await;
        assert!(matches!(no_input, Err(PipelineError::ValidationError(_))));

        let mut no_template = request("c", REPO, "src");
        no_template.spec.trigger.template_name = "missing".to_string();
        let result = create_git_source(&store, no_template).await;
        assert!(matches!(result, Err(PipelineError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_repository_validation() {
        let store = store_with_template().await;

        let option_url = create_git_source(&store, request("a", "--upload-pack=x", "src")).await;
        assert!(matches!(option_url, Err(PipelineError::ValidationError(_))));

        let mut bad_branch = request("b", REPO, "src");
        bad_branch.spec.repository.branch = "my branch".to_string();
        let result = create_git_source(&store, bad_branch).await;
        assert!(matches!(result, Err(PipelineError::ValidationError(_))));

        let mut zero_interval = request("c", REPO, "src");
        zero_interval.spec.poll.interval_minutes = Some(0);
        let result = create_git_source(&store, zero_interval).await;
        assert!(matches!(result, Err(PipelineError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_delete_takes_started_pipelines() {
        let store = store_with_template().await;
        let source = create_git_source(&store, request("app", REPO, "src")).await.unwrap();
        store
            .create_resource(source.pipeline_for("0123456789abcdef"))
            .await
            .unwrap();

        let key = ObjectKey::new("default", "app");
        assert_eq!(delete_git_source(&store, &key).await.unwrap(), 2);
        assert!(store.list_resources::<Pipeline>(None).await.unwrap().is_empty());

        let result = get_git_source(&store, &key).await;
        assert!(matches!(result, Err(PipelineError::NotFound(_))));
    }
}
