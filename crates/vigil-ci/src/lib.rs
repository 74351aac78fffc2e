//! Vigil CI - continuous verification of a tracked branch
//!
//! Provides the watch loop that:
//! - Polls a branch and sequences new commits oldest first
//! - Runs the test and format gates against each commit
//! - Publishes gate reports to a static-site repository
//! - Files an issue on failure, or moves the known-good tag on success

pub mod config;
pub mod gate;
pub mod github;
pub mod marker;
pub mod notifier;
pub mod pipeline;
pub mod poller;
pub mod publisher;
pub mod render;
pub mod runner;
pub mod sequencer;
pub mod stage;
pub mod watcher;

// Re-export key types
pub use config::WatchConfig;
pub use gate::{FailureKind, IssueLabels};
pub use github::{GitHubClient, GitHubError, IssueTracker, UserSearch};
pub use marker::OutcomeMarker;
pub use notifier::{compose_issue, Notifier};
pub use pipeline::{CommitOutcome, CommitPipeline, CommitReport, Stage};
pub use poller::RemotePoller;
pub use publisher::ReportPublisher;
pub use runner::{GateRunner, StageOutput};
pub use sequencer::CommitSequencer;
pub use stage::{BuiltinGate, GateCommand};
pub use watcher::Watcher;
