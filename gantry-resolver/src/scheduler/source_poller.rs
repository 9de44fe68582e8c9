//! Git source poller
//!
//! On every tick, asks the remote of each due GitSource for its branch head.
//! A head the source has not recorded yet starts a Pipeline named after the
//! source and commit; the pipeline name makes repeated polls, and several
//! resolvers polling at once, start it only once.

use anyhow::Result;
use chrono::{DateTime, Utc};
use gantry_core::domain::{
    GIT_SOURCE_TYPE, GitSource, Kind, ObjectKey, Pipeline, RepoConfig, WorkflowTemplate,
};
use gantry_store::{ObjectStore, StoreExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, error, info, warn};

use super::modify;
use crate::config::Config;
use crate::error::ResolveError;
use crate::resolver::git::remote_head;

/// Poller that turns new branch heads into pipeline runs
pub struct SourcePoller {
    store: Arc<dyn ObjectStore>,
    interval: Duration,
}

impl SourcePoller {
    pub fn new(config: &Config, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            interval: config.source_poll_interval,
        }
    }

    /// Runs until the process exits. Each source is still only polled once
    /// its own interval has passed.
    pub async fn run(&self) -> Result<()> {
        info!("Starting git source poller (tick: {:?})", self.interval);

        let mut interval = time::interval(self.interval);
        loop {
            interval.tick().await;

            match self.poll_once(Utc::now()).await {
                Ok(started) => {
                    if started > 0 {
                        info!("Started {} pipeline(s) from git sources", started);
                    }
                }
                Err(e) => {
                    error!("Error during source poll: {}", e);
                }
            }
        }
    }

    /// Polls every source due at `now` and returns how many pipelines were
    /// started. A failing source is recorded on its status and does not stop
    /// the others.
    pub async fn poll_once(&self, now: DateTime<Utc>) -> Result<usize, ResolveError> {
        let sources: Vec<GitSource> = self
            .store
            .list_resources::<GitSource>(None)
            .await?
            .into_iter()
            .filter(|source| source.is_due(now))
            .collect();

        if sources.is_empty() {
            debug!("No git sources due");
            return Ok(0);
        }

        let mut started = 0;
        for source in sources {
            let key = source.metadata.key();

            let (commit, message) = match self.check(&source).await {
                Ok(Some(sha)) => {
                    started += 1;
                    (Some(sha), None)
                }
                Ok(None) => (None, None),
                Err(e) => {
                    warn!(source = %key, "Git source poll failed: {}", e);
                    (None, Some(e.to_string()))
                }
            };

            modify::<GitSource, _>(self.store.as_ref(), &key, |source| {
                source.status.last_polled_at = Some(now);
                if let Some(sha) = &commit {
                    source.status.last_commit_sha = Some(sha.clone());
                }
                source.status.message = message.clone();
                true
            })
            .await?;
        }

        Ok(started)
    }

    /// Returns the head commit when it is new and its pipeline now exists
    async fn check(&self, source: &GitSource) -> Result<Option<String>, ResolveError> {
        let key = source.metadata.key();
        let repository = &source.spec.repository;

        let sha = remote_head(&repository.url, &repository.branch)
            .await?
            .ok_or_else(|| {
                ResolveError::InvalidConfig(format!(
                    "branch '{}' not found in {}",
                    repository.branch, repository.url
                ))
            })?;

        if source.status.last_commit_sha.as_deref() == Some(sha.as_str()) {
            debug!(source = %key, commit = %sha, "Branch head unchanged");
            return Ok(None);
        }

        self.check_trigger(source).await?;

        let pipeline = source.pipeline_for(&sha);
        let pipeline_key = pipeline.metadata.key();
        match self.store.create_resource(pipeline).await {
            Ok(_) => {
                info!(source = %key, commit = %sha, pipeline = %pipeline_key, "Started pipeline");
            }
            Err(e) if e.is_already_exists() => {
                let existing = self.store.fetch::<Pipeline>(&pipeline_key).await?;
                if !existing.is_some_and(|p| p.metadata.is_owned_by(Kind::GitSource, &key.name)) {
                    return Err(ResolveError::InvalidConfig(format!(
                        "pipeline {} exists but was not started by {}",
                        pipeline_key, key
                    )));
                }
                debug!(source = %key, pipeline = %pipeline_key, "Pipeline already started");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Some(sha))
    }

    /// The trigger input must be a git input of this source's repository;
    /// pipelines only carry the commit.
    async fn check_trigger(&self, source: &GitSource) -> Result<(), ResolveError> {
        let trigger = &source.spec.trigger;
        let template_key =
            ObjectKey::new(source.metadata.namespace.clone(), trigger.template_name.clone());

        let template = self
            .store
            .fetch::<WorkflowTemplate>(&template_key)
            .await?
            .ok_or_else(|| {
                ResolveError::InvalidConfig(format!("workflow template {} not found", template_key))
            })?;

        let declared = template.input(&trigger.input).ok_or_else(|| {
            ResolveError::InvalidConfig(format!(
                "template {} has no input '{}'",
                template_key, trigger.input
            ))
        })?;

        if declared.source_type != GIT_SOURCE_TYPE {
            return Err(ResolveError::InvalidConfig(format!(
                "template input '{}' has type '{}', not '{}'",
                trigger.input, declared.source_type, GIT_SOURCE_TYPE
            )));
        }

        let repo: RepoConfig = serde_json::from_value(declared.config.clone()).map_err(|e| {
            ResolveError::InvalidConfig(format!("template input '{}': {}", trigger.input, e))
        })?;
        if repo.repository != source.spec.repository.url {
            return Err(ResolveError::InvalidConfig(format!(
                "template input '{}' uses repository {}, not {}",
                trigger.input, repo.repository, source.spec.repository.url
            )));
        }

        Ok(())
    }
}
