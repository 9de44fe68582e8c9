//! In-process substrate that records submissions instead of running them.
//!
//! Jobs stay `Running` until [`RecordingSubstrate::complete`] is called.

use async_trait::async_trait;
use chrono::Utc;
use gantry_core::domain::{JobStatus, ObjectKey};
use gantry_store::{ObjectStore, StoreError};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{ComputeSubstrate, JobHandle, JobRequest, SubstrateError, update_job_state};

pub struct RecordingSubstrate {
    store: Arc<dyn ObjectStore>,
    submitted: Mutex<Vec<JobRequest>>,
}

impl RecordingSubstrate {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            submitted: Mutex::new(Vec::new()),
        }
    }

    /// Every request received so far, in order
    pub async fn submitted(&self) -> Vec<JobRequest> {
        self.submitted.lock().await.clone()
    }

    /// Marks a job finished as if its container had exited
    pub async fn complete(&self, key: &ObjectKey, succeeded: bool) -> Result<(), StoreError> {
        let status = if succeeded {
            JobStatus::Succeeded
        } else {
            JobStatus::Failed
        };

        update_job_state(self.store.as_ref(), key, move |state| {
            state.status = Some(status);
            state.completed_at = Some(Utc::now());
        })
        .await
    }
}

#[async_trait]
impl ComputeSubstrate for RecordingSubstrate {
    async fn submit(&self, request: JobRequest) -> Result<JobHandle, SubstrateError> {
        let key = request.key.clone();
        let handle = {
            let mut submitted = self.submitted.lock().await;
            submitted.push(request);
            format!("recorded-{}", submitted.len())
        };

        let recorded = handle.clone();
        update_job_state(self.store.as_ref(), &key, move |state| {
            state.status = Some(JobStatus::Running);
            state.handle = Some(recorded.clone());
            state.started_at = Some(Utc::now());
        })
        .await?;

        Ok(JobHandle(handle))
    }
}
