//! Remote tip polling.

use vigil_core::error::{Result, WatchError};
use vigil_core::git::ls_remote_tip;

/// Resolves the tip of one branch on one remote.
#[derive(Debug, Clone)]
pub struct RemotePoller {
    url: String,
    branch: String,
}

impl RemotePoller {
    pub fn new(url: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            branch: branch.into(),
        }
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Current tip of the tracked branch.
    ///
    /// Returns `last` unchanged when the branch has not moved; callers treat
    /// that as a no-op. Network failures and a vanished branch surface as
    /// [`WatchError::Poll`]; there is no retry here.
    pub async fn poll(&self, last: &str) -> Result<String> {
        ls_remote_tip(&self.url, &self.branch)
            .await
            .map_err(|e| WatchError::Poll {
                branch: self.branch.clone(),
                reason: e.to_string(),
            })?
            .ok_or_else(|| WatchError::Poll {
                branch: self.branch.clone(),
                reason: format!("branch vanished from remote (last tip {last})"),
            })
    }
}
