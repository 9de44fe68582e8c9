//! Git resolver
//!
//! Checks storage first; only on a miss does it fetch the exact commit into
//! a scratch directory, pack the tree and upload it.

use async_trait::async_trait;
use gantry_client::StorageClient;
use gantry_core::domain::{GIT_SOURCE_TYPE, GitArtifactResolutionSpec, StorageReference};
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{ResolutionRequest, Resolver};
use crate::archive::pack_tree;
use crate::error::{ResolveError, Result};

pub struct GitResolver {
    storage: Arc<StorageClient>,
}

impl GitResolver {
    pub fn new(storage: Arc<StorageClient>) -> Self {
        Self { storage }
    }

    /// Checks out `commit_sha` of `repository_url` into `dir`
    async fn checkout(&self, spec: &GitArtifactResolutionSpec, dir: &Path) -> Result<()> {
        git(dir, &["init", "--quiet"]).await?;
        git(dir, &["remote", "add", "origin", spec.repository_url.as_str()]).await?;

        let shallow = git(
            dir,
            &["fetch", "--quiet", "--depth", "1", "origin", spec.commit_sha.as_str()],
        )
        .await;
        if let Err(e) = shallow {
            // Some servers refuse fetching an arbitrary sha
            warn!(
                repository = %spec.repository_url,
                commit = %spec.commit_sha,
                "Shallow fetch failed, fetching all refs: {}",
                e
            );
            git(dir, &["fetch", "--quiet", "origin"]).await?;
            return detach(dir, &spec.commit_sha).await;
        }

        detach(dir, "FETCH_HEAD").await
    }
}

#[async_trait]
impl Resolver for GitResolver {
    fn matches(&self, source_type: &str) -> bool {
        source_type == GIT_SOURCE_TYPE
    }

    async fn resolve(&self, request: &ResolutionRequest) -> Result<StorageReference> {
        if let Some(reference) = self.storage.status(&request.id).await? {
            debug!(id = %request.id, "Archive already stored, skipping clone");
            return Ok(reference);
        }

        let spec = GitArtifactResolutionSpec::from_json(&request.config)
            .map_err(|e| ResolveError::InvalidConfig(format!("{}: {}", request.id, e)))?;

        let scratch = tempfile::tempdir()?;
        info!(
            id = %request.id,
            repository = %spec.repository_url,
            commit = %spec.commit_sha,
            "Fetching commit"
        );
        self.checkout(&spec, scratch.path()).await?;

        let root = scratch.path().to_path_buf();
        let archive = tokio::task::spawn_blocking(move || pack_tree(&root))
            .await
            .map_err(|e| ResolveError::Archive(format!("packing task failed: {}", e)))??;

        info!(id = %request.id, size = archive.len(), "Uploading archive");
        let reference = self.storage.upload(&request.id, archive).await?;

        Ok(reference)
    }
}

async fn detach(dir: &Path, revision: &str) -> Result<()> {
    git(
        dir,
        &[
            "-c",
            "advice.detachedHead=false",
            "checkout",
            "--quiet",
            "--detach",
            revision,
        ],
    )
    .await
}

/// Commit at the head of `branch` in the remote repository, or `None` when
/// the branch does not exist. Nothing is cloned.
pub async fn remote_head(url: &str, branch: &str) -> Result<Option<String>> {
    if url.starts_with('-') {
        return Err(ResolveError::InvalidConfig(format!(
            "repository url '{}' looks like an option",
            url
        )));
    }

    let reference = format!("refs/heads/{}", branch);
    let listing = run(None, &["ls-remote", url, reference.as_str()]).await?;

    Ok(parse_ls_remote(&listing, &reference))
}

/// Sha listed for exactly `reference`; ls-remote patterns also match on
/// trailing path components.
fn parse_ls_remote(listing: &str, reference: &str) -> Option<String> {
    listing.lines().find_map(|line| {
        let (sha, name) = line.split_once('\t')?;
        (name.trim() == reference).then(|| sha.trim().to_string())
    })
}

/// Runs one git command inside `dir`, failing with its stderr
async fn git(dir: &Path, args: &[&str]) -> Result<()> {
    run(Some(dir), args).await.map(|_| ())
}

async fn run(dir: Option<&Path>, args: &[&str]) -> Result<String> {
    let mut command = Command::new("git");
    command.args(args).env("GIT_TERMINAL_PROMPT", "0");
    if let Some(dir) = dir {
        command.current_dir(dir);
    }
    let output = command.output().await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ResolveError::Git {
            command: args.join(" "),
            message: stderr.trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
