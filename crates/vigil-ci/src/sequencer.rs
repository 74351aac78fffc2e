//! Ordering of newly reachable commits.

use tracing::debug;
use vigil_core::error::{Result, WatchError};
use vigil_core::{CommitRecord, GitRepo};

/// Lists the commits between two tips from a local mirror.
#[derive(Debug, Clone)]
pub struct CommitSequencer {
    mirror: GitRepo,
    branch: String,
}

impl CommitSequencer {
    pub fn new(mirror: GitRepo, branch: impl Into<String>) -> Self {
        Self {
            mirror,
            branch: branch.into(),
        }
    }

    /// Commits reachable from `new` but not from `old`, oldest first.
    ///
    /// Excludes `old`, includes `new`. If `old` is unknown to the mirror or
    /// is not an ancestor of `new` the whole batch is rejected with
    /// [`WatchError::HistoryRewritten`]; nothing is skipped or repeated.
    pub async fn sequence(&self, old: &str, new: &str) -> Result<Vec<CommitRecord>> {
        if old == new {
            return Ok(Vec::new());
        }

        self.mirror.fetch(&self.branch).await?;

        if !self.mirror.has_commit(old).await || !self.mirror.is_ancestor(old, new).await? {
            return Err(WatchError::HistoryRewritten {
                old: old.to_string(),
                new: new.to_string(),
            });
        }

        let range = self.mirror.log_range(old, new).await?;
        debug!(old = %old, new = %new, commits = range.len(), "sequenced range");

        let commits: Vec<CommitRecord> = range
            .into_iter()
            .enumerate()
            .map(|(ordinal, (hash, email))| CommitRecord::new(hash, email, ordinal))
            .collect();

        match commits.last() {
            Some(last) if last.hash == new => Ok(commits),
            _ => Err(WatchError::Git(format!(
                "range {old}..{new} does not end at {new}"
            ))),
        }
    }
}
