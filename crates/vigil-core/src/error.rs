//! Error taxonomy for the watcher.
//!
//! Gate outcomes are not represented here: a failing test suite is data
//! (`GateResult`), not an error of the watcher itself.

/// Watcher errors.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("git error: {0}")]
    Git(String),

    #[error("poll of {branch} failed: {reason}")]
    Poll { branch: String, reason: String },

    #[error("history rewritten: {old} is not an ancestor of {new}")]
    HistoryRewritten { old: String, new: String },

    #[error("publishing reports for {commit} failed: {reason}")]
    Publish { commit: String, reason: String },

    #[error("notification for {commit} failed: {reason}")]
    Notify { commit: String, reason: String },

    #[error("cursor store error: {0}")]
    Cursor(String),

    #[error("invalid repository url: {0}")]
    InvalidRepoUrl(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for watcher operations.
pub type Result<T> = std::result::Result<T, WatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_rewritten_display() {
        let err = WatchError::HistoryRewritten {
            old: "abc123".to_string(),
            new: "def456".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc123"));
        assert!(msg.contains("def456"));
    }

    #[test]
    fn test_publish_error_names_commit() {
        let err = WatchError::Publish {
            commit: "abc1234".to_string(),
            reason: "non-fast-forward".to_string(),
        };
        assert!(err.to_string().contains("abc1234"));
    }
}
