//! The movable known-good tag.

use serde::{Deserialize, Serialize};

/// A tag bound to the latest commit on `branch` that passed every gate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuccessTag {
    pub name: String,
    pub commit: String,
}

impl SuccessTag {
    pub fn for_branch(branch: &str, commit: &str) -> Self {
        Self {
            name: Self::name_for(branch),
            commit: commit.to_string(),
        }
    }

    pub fn name_for(branch: &str) -> String {
        format!("{}-result-successful", branch)
    }
}
