//! Core domain types
//!
//! Every record kept in the object store, along with the phase rules the
//! reconcilers enforce on them.

pub mod artifact;
pub mod git;
pub mod git_source;
pub mod job;
pub mod meta;
pub mod object;
pub mod phase;
pub mod pipeline;
pub mod stage;
pub mod storage;
pub mod task;
pub mod workflow;

pub use artifact::{
    Artifact, ArtifactPhase, ArtifactSource, ArtifactSpec, ArtifactStatus, StorageReference,
    StorageStatus,
};
pub use git::{
    GIT_SOURCE_TYPE, GitArtifactResolution, GitArtifactResolutionSpec,
    GitArtifactResolutionStatus, GitInputConfig, RepoConfig, ResolutionPhase,
};
pub use git_source::{
    GitCloneOptions, GitRepositoryOptions, GitSource, GitSourceSpec, GitSourceStatus,
    GitSourceTrigger, PollOptions,
};
pub use job::{Job, JobSpec, JobState, JobStatus, Mount};
pub use meta::{Kind, ObjectKey, ObjectMeta, OwnerRef};
pub use object::{Object, Resource};
pub use phase::Phase;
pub use pipeline::{ArtifactRef, Pipeline, PipelineInput, PipelineSpec};
pub use stage::{Ordinal, Stage, StageSpec, StageStatus};
pub use storage::{LocalStorage, LocalStorageSpec};
pub use task::{Task, TaskSpec, TaskStatus};
pub use workflow::{InputConfig, StageConfig, TaskConfig, TaskInput, TaskOutput, WorkflowSpec, WorkflowTemplate};
