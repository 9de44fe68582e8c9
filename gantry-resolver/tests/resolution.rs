//! Resolver against a real storage server on an ephemeral port.

use flate2::read::GzDecoder;
use gantry_client::StorageClient;
use gantry_core::domain::{
    Artifact, ArtifactSource, ArtifactSpec, GitArtifactResolution, GitArtifactResolutionSpec,
    Kind, ObjectKey, ObjectMeta, ResolutionPhase,
};
use gantry_resolver::scheduler::poller::resolve_ticket;
use gantry_resolver::{
    Config, GitResolver, ResolutionPoller, ResolutionRequest, Resolver, ResolverRegistry,
};
use gantry_storage::{BlobStore, StorageService, create_router};
use gantry_store::{MemoryStore, StoreExt};
use std::io::Read;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

async fn spawn_storage() -> (Arc<StorageClient>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(StorageService::new(
        Arc::new(MemoryStore::new()),
        BlobStore::new(dir.path()),
        "default",
    ));
    let app = create_router(service, 16 * 1024 * 1024);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (Arc::new(StorageClient::new(format!("http://{}", addr))), dir)
}

fn git_config(repository: &str, commit: &str) -> String {
    GitArtifactResolutionSpec {
        repository_url: repository.to_string(),
        commit_sha: commit.to_string(),
    }
    .to_json()
    .unwrap()
}

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn run_git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(["-c", "user.name=gantry", "-c", "user.email=gantry@example.com"])
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?}: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Repository with two commits; returns the sha of the first
fn sample_repo(dir: &Path) -> String {
    run_git(dir, &["init", "--quiet"]);
    std::fs::write(dir.join("README.md"), "first").unwrap();
    run_git(dir, &["add", "."]);
    run_git(dir, &["commit", "--quiet", "-m", "first"]);
    let first = run_git(dir, &["rev-parse", "HEAD"]);

    std::fs::write(dir.join("README.md"), "second").unwrap();
    std::fs::write(dir.join("extra.txt"), "extra").unwrap();
    run_git(dir, &["add", "."]);
    run_git(dir, &["commit", "--quiet", "-m", "second"]);

    first
}

fn archive_entries(bytes: &[u8]) -> Vec<(String, String)> {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    archive
        .entries()
        .unwrap()
        .map(|entry| {
            let mut entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().into_owned();
            let mut contents = String::new();
            entry.read_to_string(&mut contents).unwrap();
            (path, contents)
        })
        .collect()
}

#[tokio::test]
async fn test_stored_archive_short_circuits() {
    let (storage, _dir) = spawn_storage().await;
    storage.upload("git-cached", b"archive".to_vec()).await.unwrap();

    // The repository does not exist, so any clone attempt would fail
    let resolver = GitResolver::new(storage.clone());
    let request = ResolutionRequest {
        id: "git-cached".to_string(),
        source_type: "git".to_string(),
        config: git_config("file:///nonexistent/repo.git", "deadbeef"),
    };

    let reference = resolver.resolve(&request).await.unwrap();
    assert_eq!(reference.id, "git-cached");
    assert_eq!(
        storage.download("git-cached").await.unwrap().unwrap(),
        b"archive".to_vec()
    );
}

#[tokio::test]
async fn test_unknown_repository_fails_without_upload() {
    if !git_available() {
        return;
    }

    let (storage, _dir) = spawn_storage().await;
    let resolver = GitResolver::new(storage.clone());
    let request = ResolutionRequest {
        id: "git-missing".to_string(),
        source_type: "git".to_string(),
        config: git_config("file:///nonexistent/repo.git", "deadbeef"),
    };

    assert!(resolver.resolve(&request).await.is_err());
    assert!(storage.status("git-missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_resolves_exact_commit() {
    if !git_available() {
        return;
    }

    let repo = tempfile::tempdir().unwrap();
    let first = sample_repo(repo.path());
    let url = format!("file://{}", repo.path().display());

    let (storage, _dir) = spawn_storage().await;
    let resolver = GitResolver::new(storage.clone());
    let request = ResolutionRequest {
        id: "git-first".to_string(),
        source_type: "git".to_string(),
        config: git_config(&url, &first),
    };

    let reference = resolver.resolve(&request).await.unwrap();
    assert_eq!(reference.id, "git-first");

    let bytes = storage.download("git-first").await.unwrap().unwrap();
    let entries = archive_entries(&bytes);
    assert_eq!(entries, vec![("README.md".to_string(), "first".to_string())]);
}

#[tokio::test]
async fn test_poller_records_reference() {
    let (storage, _dir) = spawn_storage().await;
    storage.upload("git-ready", b"archive".to_vec()).await.unwrap();

    let store = Arc::new(MemoryStore::new());
    let config = git_config("file:///nonexistent/repo.git", "deadbeef");
    let artifact = Artifact {
        metadata: ObjectMeta::new("default", "git-ready"),
        spec: ArtifactSpec {
            source: ArtifactSource {
                source_type: "git".to_string(),
                config: config.clone(),
            },
        },
        status: Default::default(),
    };
    store.create_resource(artifact).await.unwrap();

    let ticket = GitArtifactResolution {
        metadata: ObjectMeta::new("default", "git-ready").with_owner(Kind::Artifact, "git-ready"),
        spec: GitArtifactResolutionSpec::from_json(&config).unwrap(),
        status: Default::default(),
    };
    store.create_resource(ticket).await.unwrap();

    let mut resolvers = ResolverRegistry::new();
    resolvers.register(Arc::new(GitResolver::new(storage)));
    let poller = ResolutionPoller::new(Config::default(), store.clone(), Arc::new(resolvers));

    assert_eq!(poller.poll_once().await.unwrap(), 1);

    let key = ObjectKey::new("default", "git-ready");
    let artifact: Artifact = store.fetch(&key).await.unwrap().unwrap();
    assert_eq!(artifact.status.reference.unwrap().id, "git-ready");

    let ticket: GitArtifactResolution = store.fetch(&key).await.unwrap().unwrap();
    assert_eq!(ticket.status.phase, Some(ResolutionPhase::Resolved));

    // Resolved tickets are left alone
    let writes = store.writes();
    assert_eq!(poller.poll_once().await.unwrap(), 0);
    assert_eq!(store.writes(), writes);
}

#[tokio::test]
async fn test_ticket_without_artifact_is_skipped() {
    let store = MemoryStore::new();
    let ticket = GitArtifactResolution {
        metadata: ObjectMeta::new("default", "git-orphan"),
        spec: GitArtifactResolutionSpec {
            repository_url: "file:///nonexistent/repo.git".to_string(),
            commit_sha: "deadbeef".to_string(),
        },
        status: Default::default(),
    };
    store.create_resource(ticket).await.unwrap();

    let key = ObjectKey::new("default", "git-orphan");
    let resolved = resolve_ticket(&store, &ResolverRegistry::new(), &key)
        .await
        .unwrap();
    assert!(!resolved);
}
