//! Domain model for the watcher.
//!
//! All hand-off between components is by value: a component produces its
//! entity once and nothing downstream mutates it.

pub mod commit;
pub mod gate;
pub mod issue;
pub mod report;
pub mod tag;

pub use commit::{BranchPointer, CommitRecord};
pub use gate::{GateKind, GatePair, GateResult, GateStatus};
pub use issue::IssueRequest;
pub use report::PublishedArtifact;
pub use tag::SuccessTag;
