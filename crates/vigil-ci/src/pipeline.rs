//! Per-commit pipeline: checkout, gates, publish, then notify or mark.
//!
//! Each step is a [`Stage`] operating on a [`CommitContext`]. The context is
//! created fresh for every commit, so no gate outcome can leak from one
//! commit into the next.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tempfile::TempDir;
use tracing::{info, warn, Instrument};
use uuid::Uuid;
use vigil_core::error::{Result, WatchError};
use vigil_core::obs::{commit_span, emit_commit_finished, emit_issue_failed};
use vigil_core::{CommitRecord, GatePair, GateResult, GitRepo, PublishedArtifact, SuccessTag};

use crate::marker::OutcomeMarker;
use crate::notifier::Notifier;
use crate::publisher::ReportPublisher;
use crate::runner::GateRunner;
use crate::stage::GateCommand;

/// What happened after the gates.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// Both gates passed and the tag was moved.
    Marked(SuccessTag),

    /// Both gates passed but the tag could not be moved.
    MarkFailed(String),

    /// An issue was filed (or an open one found).
    IssueFiled(String),

    /// Filing the issue failed.
    IssueFailed(String),
}

/// Mutable state threaded through the stages for one commit.
pub struct CommitContext {
    pub commit: CommitRecord,
    pub evaluation_id: String,
    scratch: TempDir,
    pub worktree: Option<PathBuf>,
    pub test: Option<GateResult>,
    pub format: Option<GateResult>,
    pub artifacts: Vec<PublishedArtifact>,
    pub outcome: Option<CommitOutcome>,
}

impl CommitContext {
    /// Fresh context with its own scratch directory under `root`.
    pub fn new(commit: CommitRecord, root: &Path) -> Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix(&format!("commit-{}-", commit.short()))
            .tempdir_in(root)?;
        Ok(Self {
            commit,
            evaluation_id: Uuid::new_v4().to_string(),
            scratch,
            worktree: None,
            test: None,
            format: None,
            artifacts: Vec::new(),
            outcome: None,
        })
    }

    /// Scratch space outside the work tree.
    pub fn scratch(&self) -> &Path {
        self.scratch.path()
    }

    fn worktree(&self) -> Result<&Path> {
        self.worktree
            .as_deref()
            .ok_or_else(|| WatchError::Git(format!("{} is not checked out", self.commit.hash)))
    }

    /// Both gate results, once both gates have run.
    pub fn gates(&self) -> Option<GatePair> {
        Some(GatePair {
            test: self.test.clone()?,
            format: self.format.clone()?,
        })
    }

    fn require_gates(&self, stage: &str) -> Result<GatePair> {
        self.gates().ok_or_else(|| {
            WatchError::Git(format!("stage {stage} ran before both gates finished"))
        })
    }
}

/// One step of the per-commit pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run the stage. An error aborts the remaining stages.
    async fn run(&self, ctx: &mut CommitContext) -> Result<()>;

    /// Release resources; called for every stage after the pipeline ends,
    /// whether or not it failed.
    async fn cleanup(&self, _ctx: &CommitContext) {}
}

/// Checks the commit out into a detached worktree of the code mirror.
pub struct Checkout {
    mirror: GitRepo,
}

impl Checkout {
    pub fn new(mirror: GitRepo) -> Self {
        Self { mirror }
    }
}

#[async_trait]
impl Stage for Checkout {
    fn name(&self) -> &'static str {
        "checkout"
    }

    async fn run(&self, ctx: &mut CommitContext) -> Result<()> {
        let tree = ctx.scratch().join("tree");
        self.mirror.add_worktree(&tree, &ctx.commit.hash).await?;
        ctx.worktree = Some(tree);
        Ok(())
    }

    async fn cleanup(&self, ctx: &CommitContext) {
        if let Some(tree) = &ctx.worktree {
            if let Err(e) = self.mirror.remove_worktree(tree).await {
                warn!(error = %e, "failed to remove worktree");
            }
        }
    }
}

/// Runs the test suite.
pub struct TestGate {
    command: GateCommand,
}

impl TestGate {
    pub fn new(command: GateCommand) -> Self {
        Self { command }
    }
}

#[async_trait]
impl Stage for TestGate {
    fn name(&self) -> &'static str {
        "test_gate"
    }

    async fn run(&self, ctx: &mut CommitContext) -> Result<()> {
        let result = GateRunner::run(&self.command, ctx.worktree()?, ctx.scratch()).await;
        ctx.test = Some(result);
        Ok(())
    }
}

/// Runs the check-only formatter.
pub struct FormatGate {
    command: GateCommand,
}

impl FormatGate {
    pub fn new(command: GateCommand) -> Self {
        Self { command }
    }
}

#[async_trait]
impl Stage for FormatGate {
    fn name(&self) -> &'static str {
        "format_gate"
    }

    async fn run(&self, ctx: &mut CommitContext) -> Result<()> {
        let result = GateRunner::run(&self.command, ctx.worktree()?, ctx.scratch()).await;
        ctx.format = Some(result);
        Ok(())
    }
}

/// Pushes the gate artifacts to the report repository.
pub struct Publish {
    publisher: Arc<ReportPublisher>,
}

impl Publish {
    pub fn new(publisher: Arc<ReportPublisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl Stage for Publish {
    fn name(&self) -> &'static str {
        "publish"
    }

    async fn run(&self, ctx: &mut CommitContext) -> Result<()> {
        let gates = ctx.require_gates(self.name())?;
        ctx.artifacts = self.publisher.publish(&ctx.commit, &gates).await?;
        Ok(())
    }
}

/// Files an issue for a failing commit, or moves the success tag.
///
/// Neither branch is fatal: a failed issue or tag push is recorded in the
/// outcome and the watcher moves on to the next commit.
pub struct Outcome {
    notifier: Arc<Notifier>,
    marker: OutcomeMarker,
}

impl Outcome {
    pub fn new(notifier: Arc<Notifier>, marker: OutcomeMarker) -> Self {
        Self { notifier, marker }
    }
}

#[async_trait]
impl Stage for Outcome {
    fn name(&self) -> &'static str {
        "outcome"
    }

    async fn run(&self, ctx: &mut CommitContext) -> Result<()> {
        let gates = ctx.require_gates(self.name())?;
        let outcome = if gates.all_passed() {
            match self.marker.mark_success(&ctx.commit).await {
                Ok(tag) => CommitOutcome::Marked(tag),
                Err(e) => {
                    warn!(error = %e, "failed to move success tag");
                    CommitOutcome::MarkFailed(e.to_string())
                }
            }
        } else {
            match self.notifier.notify(&ctx.commit, &gates, &ctx.artifacts).await {
                Ok(url) => CommitOutcome::IssueFiled(url),
                Err(e) => {
                    emit_issue_failed(&ctx.commit.hash, &e);
                    CommitOutcome::IssueFailed(e.to_string())
                }
            }
        };
        ctx.outcome = Some(outcome);
        Ok(())
    }
}

/// Summary of one commit's trip through the pipeline.
#[derive(Debug, Clone)]
pub struct CommitReport {
    pub commit: CommitRecord,
    pub evaluation_id: String,
    pub gates: Option<GatePair>,
    pub artifacts: Vec<PublishedArtifact>,
    pub outcome: Option<CommitOutcome>,
    pub duration_ms: u64,
}

impl CommitReport {
    pub fn all_passed(&self) -> bool {
        self.gates.as_ref().is_some_and(GatePair::all_passed)
    }
}

/// Ordered stages run strictly one after another.
pub struct CommitPipeline {
    stages: Vec<Box<dyn Stage>>,
    scratch_root: PathBuf,
}

impl CommitPipeline {
    pub fn new(scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            stages: Vec::new(),
            scratch_root: scratch_root.into(),
        }
    }

    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// The standard pipeline: checkout, test, format, publish, outcome.
    pub fn standard(
        scratch_root: impl Into<PathBuf>,
        mirror: GitRepo,
        test_gate: GateCommand,
        format_gate: GateCommand,
        publisher: Arc<ReportPublisher>,
        notifier: Arc<Notifier>,
        marker: OutcomeMarker,
    ) -> Self {
        Self::new(scratch_root)
            .stage(Checkout::new(mirror))
            .stage(TestGate::new(test_gate))
            .stage(FormatGate::new(format_gate))
            .stage(Publish::new(publisher))
            .stage(Outcome::new(notifier, marker))
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage for `commit`.
    ///
    /// Cleanup runs for all stages, in reverse order, before an error from
    /// any stage is returned.
    pub async fn run(&self, commit: CommitRecord) -> Result<CommitReport> {
        let ctx = CommitContext::new(commit, &self.scratch_root)?;
        let span = commit_span(ctx.commit.short(), &ctx.evaluation_id);
        self.evaluate(ctx).instrument(span).await
    }

    async fn evaluate(&self, mut ctx: CommitContext) -> Result<CommitReport> {
        let start = Instant::now();
        info!(ordinal = ctx.commit.ordinal, author = %ctx.commit.author_email, "evaluating commit");

        let mut failure = None;
        for stage in &self.stages {
            if let Err(e) = stage.run(&mut ctx).await {
                warn!(stage = stage.name(), error = %e, "stage failed");
                failure = Some(e);
                break;
            }
        }
        for stage in self.stages.iter().rev() {
            stage.cleanup(&ctx).await;
        }
        if let Some(e) = failure {
            return Err(e);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let report = CommitReport {
            gates: ctx.gates(),
            commit: ctx.commit,
            evaluation_id: ctx.evaluation_id,
            artifacts: ctx.artifacts,
            outcome: ctx.outcome,
            duration_ms,
        };
        emit_commit_finished(&report.commit.hash, report.all_passed(), duration_ms);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use vigil_core::{GateKind, GateStatus};

    struct Record {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl Stage for Record {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn run(&self, _ctx: &mut CommitContext) -> Result<()> {
            self.log.lock().unwrap().push(format!("run:{}", self.name));
            if self.fail {
                return Err(WatchError::Git("boom".to_string()));
            }
            Ok(())
        }

        async fn cleanup(&self, _ctx: &CommitContext) {
            self.log.lock().unwrap().push(format!("cleanup:{}", self.name));
        }
    }

    struct FixedGates;

    #[async_trait]
    impl Stage for FixedGates {
        fn name(&self) -> &'static str {
            "fixed_gates"
        }

        async fn run(&self, ctx: &mut CommitContext) -> Result<()> {
            for kind in [GateKind::Test, GateKind::Format] {
                let result = GateResult {
                    gate: kind,
                    status: GateStatus::Passed,
                    exit_code: 0,
                    artifact: String::new(),
                    duration_ms: 0,
                };
                match kind {
                    GateKind::Test => ctx.test = Some(result),
                    GateKind::Format => ctx.format = Some(result),
                }
            }
            Ok(())
        }
    }

    fn record(name: &'static str, log: &Arc<Mutex<Vec<String>>>, fail: bool) -> Record {
        Record {
            name,
            log: log.clone(),
            fail,
        }
    }

    #[tokio::test]
    async fn test_stages_run_in_order_and_cleanup_in_reverse() {
        let root = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = CommitPipeline::new(root.path())
            .stage(record("a", &log, false))
            .stage(record("b", &log, false));

        let report = pipeline
            .run(CommitRecord::new("abc1234", "dev@example.com", 0))
            .await
            .unwrap();

        assert!(report.gates.is_none());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["run:a", "run:b", "cleanup:b", "cleanup:a"]
        );
    }

    #[tokio::test]
    async fn test_failure_stops_pipeline_but_still_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = CommitPipeline::new(root.path())
            .stage(record("a", &log, true))
            .stage(record("b", &log, false));

        let result = pipeline
            .run(CommitRecord::new("abc1234", "dev@example.com", 0))
            .await;

        assert!(result.is_err());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["run:a", "cleanup:b", "cleanup:a"]
        );
    }

    #[tokio::test]
    async fn test_each_commit_gets_fresh_context() {
        let root = tempfile::tempdir().unwrap();
        let pipeline = CommitPipeline::new(root.path()).stage(FixedGates);

        let first = pipeline
            .run(CommitRecord::new("aaa1111", "dev@example.com", 0))
            .await
            .unwrap();
        let second = pipeline
            .run(CommitRecord::new("bbb2222", "dev@example.com", 1))
            .await
            .unwrap();

        assert!(first.all_passed());
        assert!(second.all_passed());
        assert_ne!(first.evaluation_id, second.evaluation_id);
        // Scratch directories are removed with their context.
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    /// Records the current span name, then yields for a while.
    struct Slow {
        seen: Arc<Mutex<Option<&'static str>>>,
    }

    #[async_trait]
    impl Stage for Slow {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn run(&self, _ctx: &mut CommitContext) -> Result<()> {
            *self.seen.lock().unwrap() = tracing::Span::current().metadata().map(|m| m.name());
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            Ok(())
        }
    }

    fn require_send<F: std::future::Future + Send>(fut: F) -> F {
        fut
    }

    #[tokio::test]
    async fn test_commit_span_is_not_current_in_sibling_futures() {
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry());
        let root = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(None));
        let pipeline = CommitPipeline::new(root.path()).stage(Slow { seen: seen.clone() });

        let evaluation =
            require_send(pipeline.run(CommitRecord::new("abc1234", "dev@example.com", 0)));
        let sibling = async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            tracing::Span::current().metadata().map(|m| m.name())
        };
        let (report, outside) = tokio::join!(evaluation, sibling);

        report.unwrap();
        assert_eq!(*seen.lock().unwrap(), Some("vigil.commit"));
        assert_eq!(outside, None);
    }

    #[tokio::test]
    async fn test_publish_requires_gates() {
        let root = tempfile::tempdir().unwrap();
        let mut ctx =
            CommitContext::new(CommitRecord::new("abc1234", "dev@example.com", 0), root.path())
                .unwrap();
        let publisher = Arc::new(
            ReportPublisher::new("/tmp/acme/reports.git", "gh-pages", root.path().join("r"))
                .unwrap(),
        );
        let err = Publish::new(publisher).run(&mut ctx).await.unwrap_err();
        assert!(err.to_string().contains("before both gates"));
    }
}
