//! Compute substrate
//!
//! Where task containers actually run. The task reconciler records a Job
//! for every task and hands it to a [`ComputeSubstrate`]; the substrate
//! reports progress by updating that Job's status in the object store.

pub mod podman;
pub mod recording;

pub use podman::PodmanSubstrate;
pub use recording::RecordingSubstrate;

use async_trait::async_trait;
use gantry_core::domain::{Job, JobState, Mount, ObjectKey};
use gantry_store::{ObjectStore, StoreError, StoreExt};
use std::fmt;
use thiserror::Error;

/// Mount point of the read-only volume holding the task entrypoint
pub const INIT_MOUNT_PATH: &str = "/gantry-init";

/// Script every task container runs with `bash`
pub const ENTRYPOINT_PATH: &str = "/gantry-init/entrypoint.sh";

/// Mount point of the task's scratch volume, also the default working dir
pub const DATA_MOUNT_PATH: &str = "/gantry-data";

const STATE_UPDATE_ATTEMPTS: u32 = 5;

#[derive(Debug, Error)]
pub enum SubstrateError {
    #[error("failed to launch job {key}: {message}")]
    Launch { key: ObjectKey, message: String },

    #[error("substrate I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Everything a substrate needs to run one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub key: ObjectKey,
    pub image: String,
    pub script: String,
    pub working_dir: String,
    pub mounts: Vec<Mount>,
}

impl From<&Job> for JobRequest {
    fn from(job: &Job) -> Self {
        Self {
            key: job.metadata.key(),
            image: job.spec.image.clone(),
            script: job.spec.script.clone(),
            working_dir: job.spec.working_dir.clone(),
            mounts: job.spec.mounts.clone(),
        }
    }
}

/// Substrate-specific identifier of a submitted job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle(pub String);

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait ComputeSubstrate: Send + Sync {
    /// Starts the job and records it as `Running` with its handle. Called
    /// again only for a Job that was never acknowledged, in which case
    /// anything left over from the earlier attempt is replaced.
    async fn submit(&self, request: JobRequest) -> Result<JobHandle, SubstrateError>;
}

/// Applies `change` to a Job's status, refetching on version conflicts.
/// A Job that no longer exists is left alone.
pub async fn update_job_state<F>(
    store: &dyn ObjectStore,
    key: &ObjectKey,
    change: F,
) -> Result<(), StoreError>
where
    F: Fn(&mut JobState) + Send + Sync,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        let Some(mut job) = store.fetch::<Job>(key).await? else {
            tracing::warn!(job = %key, "Job disappeared before its status could be recorded");
            return Ok(());
        };

        change(&mut job.status);

        match store.update_resource(job).await {
            Ok(_) => return Ok(()),
            Err(e) if e.is_conflict() && attempt < STATE_UPDATE_ATTEMPTS => {
                tracing::debug!(job = %key, "Job status update conflicted, retrying");
            }
            Err(e) => return Err(e),
        }
    }
}
