//! Branch tips and the commits discovered between them.

use serde::{Deserialize, Serialize};

/// The last evaluated tip of a tracked branch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BranchPointer {
    /// Repository URL the branch lives in.
    pub repository: String,

    /// Tracked branch name.
    pub branch: String,

    /// Commit hash the pointer is bound to.
    pub commit: String,
}

impl BranchPointer {
    pub fn new(
        repository: impl Into<String>,
        branch: impl Into<String>,
        commit: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            branch: branch.into(),
            commit: commit.into(),
        }
    }

    /// Rebind to `commit`. Returns `false` (and leaves the pointer alone)
    /// when the hash is unchanged.
    pub fn advance(&mut self, commit: &str) -> bool {
        if self.commit == commit {
            return false;
        }
        self.commit = commit.to_string();
        true
    }
}

/// A commit scheduled for evaluation within one batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitRecord {
    /// Full commit hash.
    pub hash: String,

    /// Author email as recorded in the commit.
    pub author_email: String,

    /// Zero-based position in the batch (oldest first).
    pub ordinal: usize,
}

impl CommitRecord {
    pub fn new(hash: impl Into<String>, author_email: impl Into<String>, ordinal: usize) -> Self {
        Self {
            hash: hash.into(),
            author_email: author_email.into(),
            ordinal,
        }
    }

    /// Abbreviated hash (first 7 chars).
    pub fn short(&self) -> &str {
        &self.hash[..7.min(self.hash.len())]
    }
}
