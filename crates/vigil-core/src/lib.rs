//! Vigil Core
//!
//! Domain model, git plumbing, durable cursor and tracing shared by the
//! watcher crates.

pub mod cursor;
pub mod domain;
pub mod error;
pub mod git;
pub mod obs;
pub mod repo;
pub mod telemetry;

pub use cursor::{Cursor, CursorStore, FsCursorStore, MemoryCursorStore};
pub use domain::{
    BranchPointer, CommitRecord, GateKind, GatePair, GateResult, GateStatus, IssueRequest,
    PublishedArtifact, SuccessTag,
};
pub use error::{Result, WatchError};
pub use git::{ls_remote_tip, GitRepo};
pub use obs::commit_span;
pub use repo::RepoSlug;
pub use telemetry::init_tracing;
