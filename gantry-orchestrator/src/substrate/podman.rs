//! Podman compute substrate
//!
//! Runs each job as a detached container:
//! - the job script is written to `entrypoint.sh` inside the init volume
//! - every mount is a host directory under the work root
//! - a background monitor waits for the container and records the outcome

use async_trait::async_trait;
use chrono::Utc;
use gantry_core::domain::{Job, JobStatus, ObjectKey};
use gantry_core::identity::NAME_SEPARATOR;
use gantry_store::{ObjectStore, StoreExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use super::{
    ComputeSubstrate, ENTRYPOINT_PATH, INIT_MOUNT_PATH, JobHandle, JobRequest, SubstrateError,
    update_job_state,
};

/// Checks if podman is installed and available
pub async fn check_podman_available() -> Result<(), SubstrateError> {
    let output = Command::new("podman").arg("--version").output().await?;

    if !output.status.success() {
        return Err(SubstrateError::Io(std::io::Error::other(
            "podman is not working correctly",
        )));
    }

    let version = String::from_utf8_lossy(&output.stdout);
    info!("Podman is available: {}", version.trim());

    Ok(())
}

pub struct PodmanSubstrate {
    store: Arc<dyn ObjectStore>,
    work_root: PathBuf,
}

impl PodmanSubstrate {
    pub fn new(store: Arc<dyn ObjectStore>, work_root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            work_root: work_root.into(),
        }
    }

    /// Container name for a job; podman names are global so the namespace
    /// is folded in.
    pub fn container_name(key: &ObjectKey) -> String {
        format!("gantry-{}{}{}", key.namespace, NAME_SEPARATOR, key.name)
    }

    fn job_dir(&self, key: &ObjectKey) -> PathBuf {
        self.work_root.join(&key.namespace).join(&key.name)
    }

    /// Restarts monitors for jobs that were running when the process
    /// stopped. Returns how many were picked up.
    pub async fn resume(&self) -> Result<usize, SubstrateError> {
        let jobs = self.store.list_resources::<Job>(None).await?;
        let mut resumed = 0;

        for job in jobs {
            if job.status.status != Some(JobStatus::Running) {
                continue;
            }
            let Some(handle) = job.status.handle.clone() else {
                continue;
            };

            info!(job = %job.metadata.key(), container = %handle, "Resuming job monitor");
            spawn_monitor(self.store.clone(), job.metadata.key(), handle);
            resumed += 1;
        }

        Ok(resumed)
    }

    /// Creates the host directory for every mount and writes the entrypoint
    async fn prepare_mounts(&self, request: &JobRequest) -> Result<Vec<(PathBuf, String, bool)>, SubstrateError> {
        let job_dir = self.job_dir(&request.key);
        let mut volumes = Vec::with_capacity(request.mounts.len());

        for mount in &request.mounts {
            let host_dir = job_dir.join(&mount.name);
            tokio::fs::create_dir_all(&host_dir).await?;

            if mount.path == INIT_MOUNT_PATH {
                write_entrypoint(&host_dir, &request.script).await?;
            }

            volumes.push((host_dir, mount.path.clone(), mount.read_only));
        }

        Ok(volumes)
    }
}

async fn write_entrypoint(dir: &Path, script: &str) -> Result<(), SubstrateError> {
    let path = dir.join("entrypoint.sh");
    tokio::fs::write(&path, script).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).await?;
    }

    Ok(())
}

#[async_trait]
impl ComputeSubstrate for PodmanSubstrate {
    async fn submit(&self, request: JobRequest) -> Result<JobHandle, SubstrateError> {
        let container_name = Self::container_name(&request.key);
        let volumes = self.prepare_mounts(&request).await?;

        info!(
            "Starting container {} for job {} with image {}",
            container_name, request.key, request.image
        );

        let output = Command::new("podman")
            .args(run_args(&container_name, &volumes, &request))
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !stderr.trim().is_empty() {
            debug!("podman run stderr: {}", stderr.trim());
        }

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            let message = format!(
                "podman run exited with {}: stdout='{}', stderr='{}'",
                exit_code,
                stdout.trim(),
                stderr.trim()
            );
            error!("{}", message);
            return Err(SubstrateError::Launch {
                key: request.key,
                message,
            });
        }

        let container_id = stdout.trim().to_string();
        info!(
            "Container {} started successfully with ID: {}",
            container_name, container_id
        );

        let handle = container_id.clone();
        update_job_state(self.store.as_ref(), &request.key, move |state| {
            state.status = Some(JobStatus::Running);
            state.handle = Some(handle.clone());
            state.started_at = Some(Utc::now());
        })
        .await?;

        spawn_monitor(self.store.clone(), request.key, container_id.clone());
        Ok(JobHandle(container_id))
    }
}

/// `podman run` arguments for a job. `--replace` makes a resubmission take
/// over the name from a container an earlier attempt left behind.
fn run_args(container_name: &str, volumes: &[(PathBuf, String, bool)], request: &JobRequest) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "--replace".to_string(),
        "--name".to_string(),
        container_name.to_string(),
    ];

    for (host_dir, path, read_only) in volumes {
        let suffix = if *read_only { ":ro" } else { "" };
        args.push("-v".to_string());
        args.push(format!("{}:{}{}", host_dir.display(), path, suffix));
    }

    args.extend([
        "-w".to_string(),
        request.working_dir.clone(),
        request.image.clone(),
        "bash".to_string(),
        ENTRYPOINT_PATH.to_string(),
    ]);
    args
}

/// Waits for the container to exit, records the result, removes it
fn spawn_monitor(store: Arc<dyn ObjectStore>, key: ObjectKey, container_id: String) {
    tokio::spawn(async move {
        let (status, message) = match wait_for_exit(&container_id).await {
            Ok(0) => (JobStatus::Succeeded, None),
            Ok(code) => (JobStatus::Failed, Some(format!("container exited with {}", code))),
            Err(e) => (JobStatus::Failed, Some(format!("failed to wait for container: {}", e))),
        };

        info!(job = %key, ?status, "Job finished");

        let result = update_job_state(store.as_ref(), &key, move |state| {
            state.status = Some(status);
            state.message = message.clone();
            state.completed_at = Some(Utc::now());
        })
        .await;
        if let Err(e) = result {
            error!(job = %key, "Failed to record job result: {}", e);
        }

        match Command::new("podman")
            .arg("rm")
            .arg("-f")
            .arg(&container_id)
            .output()
            .await
        {
            Ok(output) if output.status.success() => {
                debug!("Container {} removed", container_id);
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!("Failed to remove container {}: {}", container_id, stderr);
            }
            Err(e) => {
                warn!("Failed to remove container {}: {}", container_id, e);
            }
        }
    });
}

async fn wait_for_exit(container_id: &str) -> Result<i32, SubstrateError> {
    let output = Command::new("podman")
        .arg("wait")
        .arg(container_id)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SubstrateError::Io(std::io::Error::other(format!(
            "podman wait failed: {}",
            stderr.trim()
        ))));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout.trim().parse::<i32>().map_err(|e| {
        SubstrateError::Io(std::io::Error::other(format!(
            "unexpected podman wait output '{}': {}",
            stdout.trim(),
            e
        )))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::domain::Mount;
    use gantry_store::MemoryStore;

    #[test]
    fn test_container_name_includes_namespace() {
        let key = ObjectKey::new("ci", "p.build.1.compile.1");
        assert_eq!(
            PodmanSubstrate::container_name(&key),
            "gantry-ci.p.build.1.compile.1"
        );
        assert_ne!(
            PodmanSubstrate::container_name(&ObjectKey::new("a-b", "c")),
            PodmanSubstrate::container_name(&ObjectKey::new("a", "b-c"))
        );
    }

    #[tokio::test]
    async fn test_prepare_mounts_writes_entrypoint() {
        let dir = tempfile::tempdir().unwrap();
        let substrate = PodmanSubstrate::new(Arc::new(MemoryStore::new()), dir.path());
        let request = JobRequest {
            key: ObjectKey::new("default", "t"),
            image: "alpine".to_string(),
            script: "echo hi".to_string(),
            working_dir: "/gantry-data".to_string(),
            mounts: vec![
                Mount {
                    name: "init".to_string(),
                    path: INIT_MOUNT_PATH.to_string(),
                    read_only: true,
                },
                Mount {
                    name: "data".to_string(),
                    path: "/gantry-data".to_string(),
                    read_only: false,
                },
            ],
        };

        let volumes = substrate.prepare_mounts(&request).await.unwrap();
        assert_eq!(volumes.len(), 2);
        assert!(volumes[0].2);

        let script = std::fs::read_to_string(dir.path().join("default/t/init/entrypoint.sh")).unwrap();
        assert_eq!(script, "echo hi");
        assert!(dir.path().join("default/t/data").is_dir());

        let args = run_args("gantry-default.t", &volumes, &request);
        assert_eq!(&args[..5], ["run", "-d", "--replace", "--name", "gantry-default.t"]);
        assert!(args.contains(&format!("{}:/gantry-init:ro", volumes[0].0.display())));
        assert_eq!(
            &args[args.len() - 5..],
            ["-w", "/gantry-data", "alpine", "bash", "/gantry-init/entrypoint.sh"]
        );
    }
}
