//! Git source polling against local repositories.

use chrono::{TimeDelta, Utc};
use gantry_core::domain::{
    GitCloneOptions, GitRepositoryOptions, GitSource, GitSourceSpec, GitSourceTrigger,
    InputConfig, Kind, ObjectKey, ObjectMeta, Pipeline, PollOptions, WorkflowSpec,
    WorkflowTemplate,
};
use gantry_resolver::resolver::git::remote_head;
use gantry_resolver::{Config, SourcePoller};
use gantry_store::{MemoryStore, StoreExt};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

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

/// Commits a change on the current branch and returns its sha
fn commit(dir: &Path, contents: &str) -> String {
    std::fs::write(dir.join("README.md"), contents).unwrap();
    run_git(dir, &["add", "."]);
    run_git(dir, &["commit", "--quiet", "-m", contents]);
    run_git(dir, &["rev-parse", "HEAD"])
}

/// Repository on branch `main` with one commit; returns its url
fn sample_repo(dir: &Path) -> String {
    run_git(dir, &["init", "--quiet"]);
    run_git(dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    commit(dir, "first");
    dir.to_string_lossy().into_owned()
}

fn key(name: &str) -> ObjectKey {
    ObjectKey::new("default", name)
}

async fn setup(url: &str, template_repository: &str) -> (Arc<MemoryStore>, SourcePoller) {
    let store = Arc::new(MemoryStore::new());

    let mut inputs = BTreeMap::new();
    inputs.insert(
        "src".to_string(),
        InputConfig {
            source_type: "git".to_string(),
            config: json!({ "repository": template_repository }),
        },
    );
    let template = WorkflowTemplate {
        metadata: ObjectMeta::new("default", "ci"),
        spec: WorkflowSpec {
            inputs,
            stages: Vec::new(),
        },
    };
    store.create_resource(template).await.unwrap();

    let source = GitSource {
        metadata: ObjectMeta::new("default", "app"),
        spec: GitSourceSpec {
            repository: GitRepositoryOptions {
                url: url.to_string(),
                branch: "main".to_string(),
            },
            clone: GitCloneOptions::default(),
            poll: PollOptions {
                interval_minutes: Some(5),
            },
            trigger: GitSourceTrigger {
                template_name: "ci".to_string(),
                input: "src".to_string(),
            },
        },
        status: Default::default(),
    };
    store.create_resource(source).await.unwrap();

    let poller = SourcePoller::new(&Config::default(), store.clone());
    (store, poller)
}

async fn pipelines(store: &MemoryStore) -> Vec<Pipeline> {
    store.list_resources::<Pipeline>(None).await.unwrap()
}

#[tokio::test]
async fn test_remote_head_of_local_repository() {
    if !git_available() {
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let url = sample_repo(dir.path());
    let head = run_git(dir.path(), &["rev-parse", "HEAD"]);

    assert_eq!(remote_head(&url, "main").await.unwrap(), Some(head));
    assert_eq!(remote_head(&url, "missing").await.unwrap(), None);
}

#[tokio::test]
async fn test_new_commits_start_pipelines() {
    if !git_available() {
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let url = sample_repo(dir.path());
    let first = run_git(dir.path(), &["rev-parse", "HEAD"]);
    let (store, poller) = setup(&url, &url).await;

    let now = Utc::now();
    assert_eq!(poller.poll_once(now).await.unwrap(), 1);

    let started = pipelines(&store).await;
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].metadata.name, format!("app-{}", &first[..12]));
    assert!(started[0].metadata.is_owned_by(Kind::GitSource, "app"));
    assert_eq!(started[0].spec.template_name, "ci");
    assert_eq!(started[0].spec.inputs["src"].config, json!({ "commit": first }));

    let source: GitSource = store.fetch(&key("app")).await.unwrap().unwrap();
    assert_eq!(source.status.last_commit_sha.as_deref(), Some(first.as_str()));
    assert_eq!(source.status.last_polled_at, Some(now));
    assert!(source.status.message.is_none());

    // Same head after the interval: polled, nothing started
    let later = now + TimeDelta::minutes(5);
    assert_eq!(poller.poll_once(later).await.unwrap(), 0);
    assert_eq!(pipelines(&store).await.len(), 1);

    let second = commit(dir.path(), "second");
    let after_push = later + TimeDelta::minutes(5);
    assert_eq!(poller.poll_once(after_push).await.unwrap(), 1);

    let names: Vec<_> = pipelines(&store)
        .await
        .into_iter()
        .map(|p| p.metadata.name)
        .collect();
    assert!(names.contains(&format!("app-{}", &second[..12])));
    assert_eq!(names.len(), 2);
}

#[tokio::test]
async fn test_source_is_not_polled_before_interval() {
    if !git_available() {
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let url = sample_repo(dir.path());
    let (store, poller) = setup(&url, &url).await;

    let now = Utc::now();
    poller.poll_once(now).await.unwrap();
    commit(dir.path(), "second");

    let writes = store.writes();
    assert_eq!(poller.poll_once(now + TimeDelta::minutes(4)).await.unwrap(), 0);
    assert_eq!(store.writes(), writes);
    assert_eq!(pipelines(&store).await.len(), 1);
}

#[tokio::test]
async fn test_restarted_poll_does_not_start_twice() {
    if !git_available() {
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let url = sample_repo(dir.path());
    let (store, poller) = setup(&url, &url).await;

    // Pipeline created, then the status update was lost
    let source: GitSource = store.fetch(&key("app")).await.unwrap().unwrap();
    let head = run_git(dir.path(), &["rev-parse", "HEAD"]);
    store.create_resource(source.pipeline_for(&head)).await.unwrap();

    assert_eq!(poller.poll_once(Utc::now()).await.unwrap(), 1);
    assert_eq!(pipelines(&store).await.len(), 1);

    let source: GitSource = store.fetch(&key("app")).await.unwrap().unwrap();
    assert_eq!(source.status.last_commit_sha, Some(head));
}

#[tokio::test]
async fn test_mismatched_template_is_reported() {
    if !git_available() {
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let url = sample_repo(dir.path());
    let (store, poller) = setup(&url, "https://example.com/other.git").await;

    let now = Utc::now();
    assert_eq!(poller.poll_once(now).await.unwrap(), 0);
    assert!(pipelines(&store).await.is_empty());

    let source: GitSource = store.fetch(&key("app")).await.unwrap().unwrap();
    assert!(source.status.last_commit_sha.is_none());
    assert_eq!(source.status.last_polled_at, Some(now));
    let message = source.status.message.unwrap();
    assert!(message.contains("other.git"), "{}", message);
}

#[tokio::test]
async fn test_missing_branch_is_reported() {
    if !git_available() {
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let url = sample_repo(dir.path());
    let (store, poller) = setup(&url, &url).await;

    let mut source: GitSource = store.fetch(&key("app")).await.unwrap().unwrap();
    source.spec.repository.branch = "release".to_string();
    store.update_resource(source).await.unwrap();

    assert_eq!(poller.poll_once(Utc::now()).await.unwrap(), 0);

    let source: GitSource = store.fetch(&key("app")).await.unwrap().unwrap();
    let message = source.status.message.unwrap();
    assert!(message.contains("release"), "{}", message);
    assert!(pipelines(&store).await.is_empty());
}
