//! Known-good tag maintenance.

use vigil_core::error::Result;
use vigil_core::obs::emit_tag_moved;
use vigil_core::{CommitRecord, GitRepo, SuccessTag};

/// Moves `<branch>-result-successful` to commits that passed every gate.
#[derive(Debug, Clone)]
pub struct OutcomeMarker {
    repo: GitRepo,
    branch: String,
}

impl OutcomeMarker {
    /// `repo` must have the code repository as its `origin`.
    pub fn new(repo: GitRepo, branch: impl Into<String>) -> Self {
        Self {
            repo,
            branch: branch.into(),
        }
    }

    /// Re-point the tag at `commit` and force-push it. The previous binding
    /// is discarded; the tag tracks the latest good commit, not a history.
    pub async fn mark_success(&self, commit: &CommitRecord) -> Result<SuccessTag> {
        let tag = SuccessTag::for_branch(&self.branch, &commit.hash);
        self.repo.force_tag(&tag.name, &tag.commit).await?;
        emit_tag_moved(&tag.name, &tag.commit);
        Ok(tag)
    }
}
