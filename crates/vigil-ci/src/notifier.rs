//! Failure-to-issue translation.

use std::sync::Arc;

use tracing::{debug, info, warn};
use vigil_core::error::{Result, WatchError};
use vigil_core::obs::emit_issue_filed;
use vigil_core::{CommitRecord, GateKind, GatePair, IssueRequest, PublishedArtifact, RepoSlug};

use crate::gate::{FailureKind, IssueLabels};
use crate::github::IssueTracker;

/// Fixed first paragraph of every issue body.
pub const PREAMBLE: &str =
    "This issue was opened automatically by vigil, the continuous verification watcher.";

/// Compose the issue for a commit that did not pass.
///
/// Returns `None` when both gates passed. Pure: assignee resolution happens
/// before this is called.
pub fn compose_issue(
    commit: &CommitRecord,
    gates: &GatePair,
    artifacts: &[PublishedArtifact],
    labels: &IssueLabels,
    assignee: Option<&str>,
) -> Option<IssueRequest> {
    let kind = FailureKind::from_pair(gates)?;

    let url_for = |gate: GateKind| {
        artifacts
            .iter()
            .find(|a| a.gate == gate)
            .map(|a| a.url.as_str())
    };

    let mut body = String::new();
    body.push_str(PREAMBLE);
    body.push_str("\n\n");
    body.push_str(&format!(
        "Commit `{}` by {}: {}\n\n",
        commit.hash,
        commit.author_email,
        kind.summary()
    ));
    if let Some(url) = url_for(GateKind::Test) {
        body.push_str(&format!("Test report: {url}\n"));
    }
    if gates.format.has_artifact() {
        if let Some(url) = url_for(GateKind::Format) {
            body.push_str(&format!("Formatting report: {url}\n"));
        }
    }

    let title = format!("Commit {}: {}", commit.short(), kind.summary());
    let mut issue = IssueRequest::new(title, body);
    issue.labels = kind.labels(labels);
    if let Some(login) = assignee {
        issue = issue.with_assignee(login);
    }
    Some(issue)
}

/// Files one issue per failing commit on the code repository.
pub struct Notifier {
    tracker: Arc<dyn IssueTracker>,
    repo: RepoSlug,
    labels: IssueLabels,
    dedupe: bool,
}

impl Notifier {
    pub fn new(tracker: Arc<dyn IssueTracker>, repo: RepoSlug, labels: IssueLabels) -> Self {
        Self {
            tracker,
            repo,
            labels,
            dedupe: false,
        }
    }

    /// Look for an open issue mentioning the commit before creating one.
    pub fn with_dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe = dedupe;
        self
    }

    /// Best-effort mapping from author email to a platform login.
    ///
    /// Only an unambiguous single match is used; search failures and zero or
    /// several matches all leave the issue unassigned.
    pub async fn resolve_assignee(&self, email: &str) -> Option<String> {
        match self.tracker.search_users(email).await {
            Ok(found) => {
                let login = found.unique_login().map(str::to_string);
                debug!(
                    email = %email,
                    matches = found.total_count,
                    login = ?login,
                    "user search"
                );
                login
            }
            Err(e) => {
                warn!(email = %email, error = %e, "user search failed, issue left unassigned");
                None
            }
        }
    }

    /// File an issue for a commit with at least one non-passing gate and
    /// return its URL.
    pub async fn notify(
        &self,
        commit: &CommitRecord,
        gates: &GatePair,
        artifacts: &[PublishedArtifact],
    ) -> Result<String> {
        let failure = |reason: String| WatchError::Notify {
            commit: commit.hash.clone(),
            reason,
        };

        if FailureKind::from_pair(gates).is_none() {
            return Err(failure("all gates passed, nothing to report".to_string()));
        }

        if self.dedupe {
            let existing = self
                .tracker
                .find_open_issue(&self.repo, commit.short())
                .await
                .map_err(|e| failure(e.to_string()))?;
            if let Some(url) = existing {
                info!(url = %url, "open issue already tracks this commit");
                return Ok(url);
            }
        }

        let assignee = self.resolve_assignee(&commit.author_email).await;
        let issue = compose_issue(commit, gates, artifacts, &self.labels, assignee.as_deref())
            .ok_or_else(|| failure("nothing to report".to_string()))?;

        let url = self
            .tracker
            .create_issue(&self.repo, &issue)
            .await
            .map_err(|e| failure(e.to_string()))?;
        emit_issue_filed(&url, assignee.as_deref());
        Ok(url)
    }
}
