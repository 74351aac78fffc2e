//! Issue creation payload.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One issue to be filed against the code repository.
///
/// Serializes to the host API's create-issue body; empty label and
/// assignee sets are omitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssueRequest {
    pub title: String,
    pub body: String,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub labels: BTreeSet<String>,

    /// Zero or one login.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub assignees: BTreeSet<String>,
}

impl IssueRequest {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            labels: BTreeSet::new(),
            assignees: BTreeSet::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }

    /// Replace the assignee set with a single login.
    pub fn with_assignee(mut self, login: impl Into<String>) -> Self {
        self.assignees.clear();
        self.assignees.insert(login.into());
        self
    }
}
