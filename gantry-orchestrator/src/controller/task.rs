//! Task reconciler
//!
//! `(unset) → InProgress → Complete | Error`. The Job record named after the
//! task is created before submission. Once the substrate has acknowledged
//! it (status or handle set) the task is never submitted again; a Job left
//! unacknowledged by a crash or a failed submit is submitted on the next pass.

use async_trait::async_trait;
use gantry_core::domain::{
    Job, JobSpec, JobStatus, Kind, Mount, ObjectKey, ObjectMeta, Phase, Task, TaskConfig,
};
use gantry_store::StoreExt;
use tracing::{debug, error, info, warn};

use super::{ControllerContext, ReconcileResult, Reconciler, Trigger};
use crate::substrate::{DATA_MOUNT_PATH, INIT_MOUNT_PATH, JobRequest};

/// Job spec for a task: the task shell runs from the init volume with a
/// scratch data volume as the default working directory.
pub fn job_spec(task_name: &str, config: &TaskConfig) -> JobSpec {
    JobSpec {
        image: config.image.clone(),
        script: config.shell.clone(),
        working_dir: config
            .working_dir
            .clone()
            .unwrap_or_else(|| DATA_MOUNT_PATH.to_string()),
        mounts: vec![
            Mount {
                name: format!("{}-init", task_name),
                path: INIT_MOUNT_PATH.to_string(),
                read_only: true,
            },
            Mount {
                name: format!("{}-data", task_name),
                path: DATA_MOUNT_PATH.to_string(),
                read_only: false,
            },
        ],
    }
}

pub struct TaskReconciler {
    ctx: ControllerContext,
}

impl TaskReconciler {
    pub fn new(ctx: ControllerContext) -> Self {
        Self { ctx }
    }

    /// Records the Job and submits it. An existing Job is left alone once
    /// the substrate has acknowledged it, and submitted again otherwise.
    async fn submit_once(&self, task: &Task, config: &TaskConfig) -> ReconcileResult<()> {
        let key = task.metadata.key();
        let job = Job {
            metadata: ObjectMeta::new(key.namespace.clone(), key.name.clone())
                .with_owner(Kind::Task, key.name.clone()),
            spec: job_spec(&key.name, config),
            status: Default::default(),
        };

        let job = match self.ctx.store.create_resource(job).await {
            Ok(job) => job,
            Err(e) if e.is_already_exists() => match self.ctx.store.fetch::<Job>(&key).await? {
                Some(job) if job.is_submitted() => {
                    debug!(task = %key, "Job already submitted");
                    return Ok(());
                }
                Some(job) => {
                    warn!(task = %key, "Job was recorded but never submitted, submitting it");
                    job
                }
                // Deleted in between; the delete event brings us back
                None => return Err(e.into()),
            },
            Err(e) => return Err(e.into()),
        };

        self.submit(&job).await
    }

    /// Hands a recorded Job to the substrate. On failure the Job stays
    /// unacknowledged, so the next pass submits it again.
    async fn submit(&self, job: &Job) -> ReconcileResult<()> {
        let key = job.metadata.key();
        match self.ctx.substrate.submit(JobRequest::from(job)).await {
            Ok(handle) => {
                info!(task = %key, %handle, "Submitted task");
                Ok(())
            }
            Err(e) => {
                error!(task = %key, "Failed to submit task: {}", e);
                Err(e.into())
            }
        }
    }

    async fn write_phase(&self, mut task: Task, phase: Phase) -> ReconcileResult<()> {
        let key = task.metadata.key();
        task.status.phase = Some(phase);
        self.ctx.store.update_resource(task).await?;
        info!(task = %key, %phase, "Task phase changed");
        Ok(())
    }
}

#[async_trait]
impl Reconciler for TaskReconciler {
    fn kind(&self) -> Kind {
        Kind::Task
    }

    fn triggers(&self) -> Vec<Trigger> {
        vec![Trigger::Owned(Kind::Job)]
    }

    async fn reconcile(&self, key: &ObjectKey) -> ReconcileResult<()> {
        let Some(task) = self.ctx.store.fetch::<Task>(key).await? else {
            debug!(task = %key, "Task no longer exists");
            return Ok(());
        };

        match task.status.phase {
            None => {
                let Some(config) = task.spec.config.clone() else {
                    debug!(task = %key, "Task has no config, nothing to submit");
                    return Ok(());
                };

                self.submit_once(&task, &config).await?;
                self.write_phase(task, Phase::InProgress).await
            }
            Some(Phase::InProgress) => {
                let Some(job) = self.ctx.store.fetch::<Job>(key).await? else {
                    warn!(task = %key, "Task is in progress but its job record is missing");
                    return Ok(());
                };
                if !job.is_submitted() {
                    warn!(task = %key, "Job for in-progress task never reached the substrate, submitting it");
                    return self.submit(&job).await;
                }

                let next = match job.status.status {
                    Some(JobStatus::Succeeded) => Phase::Complete,
                    Some(JobStatus::Failed) => Phase::Error,
                    _ => return Ok(()),
                };

                match Phase::advance(task.status.phase, next) {
                    Some(phase) => self.write_phase(task, phase).await,
                    None => Ok(()),
                }
            }
            Some(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_job_spec_defaults_working_dir() {
        let config = TaskConfig {
            image: "rust:1".to_string(),
            shell: "cargo build".to_string(),
            working_dir: None,
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
        };

        let spec = job_spec("p.build.1.compile.1", &config);
        assert_eq!(spec.working_dir, "/gantry-data");
        assert_eq!(spec.script, "cargo build");
        assert_eq!(spec.mounts.len(), 2);
        assert_eq!(spec.mounts[0].path, "/gantry-init");
        assert!(spec.mounts[0].read_only);
        assert_eq!(spec.mounts[1].name, "p.build.1.compile.1-data");
    }

    #[test]
    fn test_job_spec_uses_configured_working_dir() {
        let config = TaskConfig {
            image: "rust:1".to_string(),
            shell: "make".to_string(),
            working_dir: Some("/src".to_string()),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
        };
        assert_eq!(job_spec("t", &config).working_dir, "/src");
    }
}
