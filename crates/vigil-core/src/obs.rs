//! Structured lifecycle events for the watch loop.
//!
//! Every event carries an `event = "<dotted.name>"` field so log pipelines can
//! filter on it regardless of output format.

use tracing::{error, info, warn};

/// Span covering one commit's evaluation.
///
/// Attach it with `tracing::Instrument` rather than entering it, so the span
/// is only current while the evaluation itself is being polled:
///
/// ```ignore
/// pipeline.evaluate(ctx).instrument(commit_span("abc1234", "6f1c...")).await
/// ```
pub fn commit_span(commit: &str, evaluation_id: &str) -> tracing::Span {
    tracing::info_span!(
        "vigil.commit",
        commit = %commit,
        evaluation_id = %evaluation_id
    )
}

pub fn emit_poll_advanced(branch: &str, old: &str, new: &str) {
    info!(event = "poll.advanced", branch = %branch, old = %old, new = %new);
}

pub fn emit_poll_failed(branch: &str, error: &dyn std::fmt::Display) {
    warn!(event = "poll.failed", branch = %branch, error = %error);
}

pub fn emit_batch_sequenced(old: &str, new: &str, commits: usize) {
    info!(event = "batch.sequenced", old = %old, new = %new, commits = commits);
}

/// The tip moved to a commit that does not descend from the old one.
pub fn emit_batch_rejected(old: &str, new: &str, error: &dyn std::fmt::Display) {
    error!(event = "batch.rejected", old = %old, new = %new, error = %error);
}

pub fn emit_gate_finished(gate: &str, status: &str, exit_code: i32, duration_ms: u64) {
    info!(
        event = "gate.finished",
        gate = %gate,
        status = %status,
        exit_code = exit_code,
        duration_ms = duration_ms,
    );
}

pub fn emit_report_published(report_path: &str, report_commit: &str, artifacts: usize) {
    info!(
        event = "report.published",
        report_path = %report_path,
        report_commit = %report_commit,
        artifacts = artifacts,
    );
}

pub fn emit_issue_filed(url: &str, assignee: Option<&str>) {
    info!(event = "issue.filed", url = %url, assignee = assignee.unwrap_or("-"));
}

/// Filing failed; the watcher carries on with the next commit.
pub fn emit_issue_failed(commit: &str, error: &dyn std::fmt::Display) {
    warn!(event = "issue.failed", commit = %commit, error = %error);
}

pub fn emit_tag_moved(tag: &str, commit: &str) {
    info!(event = "tag.moved", tag = %tag, commit = %commit);
}

pub fn emit_commit_finished(commit: &str, all_passed: bool, duration_ms: u64) {
    info!(
        event = "commit.finished",
        commit = %commit,
        all_passed = all_passed,
        duration_ms = duration_ms,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_span_scopes_events() {
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry());
        let span = commit_span("abc1234", "eval-1");
        assert_eq!(span.metadata().map(|m| m.name()), Some("vigil.commit"));
        span.in_scope(|| {
            emit_gate_finished("test", "passed", 0, 12);
            assert_eq!(
                tracing::Span::current().metadata().map(|m| m.name()),
                Some("vigil.commit")
            );
        });
        assert!(tracing::Span::current().is_none());
    }
}
