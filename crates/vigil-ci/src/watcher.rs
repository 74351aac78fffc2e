//! The watch loop.
//!
//! One [`Watcher`] tracks one branch. Each tick polls the remote tip,
//! sequences the new commits oldest first and runs every commit through the
//! [`CommitPipeline`] before the next one starts. The branch pointer and the
//! durable cursor only move once a commit's pipeline has finished.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use tempfile::TempDir;
use tokio::time::sleep;
use tracing::info;
use vigil_core::obs::{emit_batch_rejected, emit_batch_sequenced, emit_poll_advanced, emit_poll_failed};
use vigil_core::{BranchPointer, Cursor, CursorStore, GitRepo, RepoSlug, WatchError};

use crate::config::WatchConfig;
use crate::github::IssueTracker;
use crate::marker::OutcomeMarker;
use crate::notifier::Notifier;
use crate::pipeline::{CommitPipeline, CommitReport};
use crate::poller::RemotePoller;
use crate::publisher::ReportPublisher;
use crate::sequencer::CommitSequencer;

pub struct Watcher {
    config: WatchConfig,
    poller: RemotePoller,
    sequencer: CommitSequencer,
    mirror: GitRepo,
    pipeline: CommitPipeline,
    cursor: Arc<dyn CursorStore>,
    pointer: BranchPointer,
    // Holds the mirror, the report checkout and per-commit scratch space.
    // Removed when the watcher is dropped.
    _scratch: TempDir,
}

impl Watcher {
    /// Clone the code mirror, wire up the pipeline and settle the starting
    /// point.
    ///
    /// The starting point is the saved cursor when it is still an ancestor
    /// of the remote tip. Otherwise the watcher baselines on the tip: commits
    /// already on the branch are never evaluated.
    pub async fn prepare(
        config: WatchConfig,
        tracker: Arc<dyn IssueTracker>,
        cursor: Arc<dyn CursorStore>,
    ) -> Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("vigil-")
            .tempdir()
            .context("failed to create scratch directory")?;
        let commits_dir = scratch.path().join("commits");
        tokio::fs::create_dir_all(&commits_dir).await?;

        info!(repo = %config.code_repo, "cloning code mirror");
        let mirror = GitRepo::clone(
            &config.code_repo,
            &scratch.path().join("code.git"),
            None,
            true,
        )
        .await
        .context("failed to clone code repository")?;

        let code_slug = RepoSlug::parse(&config.code_repo)?;
        let publisher = ReportPublisher::new(
            &config.report_repo,
            &config.report_branch,
            scratch.path().join("reports"),
        )?;
        let notifier = Notifier::new(tracker, code_slug, config.labels.clone())
            .with_dedupe(config.dedupe_issues);
        let marker = OutcomeMarker::new(mirror.clone(), config.code_branch.clone());

        let pipeline = CommitPipeline::standard(
            commits_dir,
            mirror.clone(),
            config.test_gate.clone(),
            config.format_gate.clone(),
            Arc::new(publisher),
            Arc::new(notifier),
            marker,
        );

        let poller = RemotePoller::new(config.code_repo.clone(), config.code_branch.clone());
        let sequencer = CommitSequencer::new(mirror.clone(), config.code_branch.clone());

        let tip = poller
            .poll("")
            .await
            .context("failed to resolve the tracked branch")?;
        let start = Self::resume_point(&config, cursor.as_ref(), &mirror, &tip).await?;
        let pointer = BranchPointer::new(
            config.code_repo.clone(),
            config.code_branch.clone(),
            start.clone(),
        );

        let watcher = Self {
            config,
            poller,
            sequencer,
            mirror,
            pipeline,
            cursor,
            pointer,
            _scratch: scratch,
        };
        watcher.save_cursor().await?;
        info!(
            branch = %watcher.config.code_branch,
            start = %start,
            tip = %tip,
            stages = ?watcher.pipeline.stage_names(),
            "watcher ready"
        );
        Ok(watcher)
    }

    async fn resume_point(
        config: &WatchConfig,
        cursor: &dyn CursorStore,
        mirror: &GitRepo,
        tip: &str,
    ) -> Result<String> {
        let saved = cursor
            .load(&config.code_repo, &config.code_branch)
            .await
            .context("failed to load cursor")?;
        let Some(saved) = saved else {
            return Ok(tip.to_string());
        };
        if mirror.has_commit(&saved.commit).await
            && mirror.is_ancestor(&saved.commit, tip).await?
        {
            info!(commit = %saved.commit, "resuming from saved cursor");
            return Ok(saved.commit);
        }
        emit_batch_rejected(
            &saved.commit,
            tip,
            &"saved cursor is not an ancestor of the branch tip",
        );
        Ok(tip.to_string())
    }

    /// The last fully evaluated commit.
    pub fn pointer(&self) -> &BranchPointer {
        &self.pointer
    }

    async fn save_cursor(&self) -> Result<()> {
        let cursor = Cursor::new(
            &self.pointer.repository,
            &self.pointer.branch,
            &self.pointer.commit,
        );
        self.cursor
            .save(&cursor)
            .await
            .context("failed to save cursor")
    }

    /// One poll cycle.
    ///
    /// A failed poll or fetch is logged and retried on the next tick. A
    /// rewritten history rejects the whole batch and re-baselines on the new
    /// tip. Any pipeline error aborts the tick with the commit named; the
    /// pointer then still names the last commit that finished.
    pub async fn tick(&mut self) -> Result<Vec<CommitReport>> {
        let last = self.pointer.commit.clone();
        let tip = match self.poller.poll(&last).await {
            Ok(tip) => tip,
            Err(e) => {
                emit_poll_failed(self.poller.branch(), &e);
                return Ok(Vec::new());
            }
        };
        if tip == last {
            return Ok(Vec::new());
        }
        emit_poll_advanced(self.poller.branch(), &last, &tip);

        let batch = match self.sequencer.sequence(&last, &tip).await {
            Ok(batch) => batch,
            Err(e @ WatchError::HistoryRewritten { .. }) => {
                emit_batch_rejected(&last, &tip, &e);
                self.pointer.advance(&tip);
                self.save_cursor().await?;
                return Ok(Vec::new());
            }
            Err(e) => {
                emit_poll_failed(self.poller.branch(), &e);
                return Ok(Vec::new());
            }
        };
        emit_batch_sequenced(&last, &tip, batch.len());

        let mut reports = Vec::with_capacity(batch.len());
        for commit in batch {
            let hash = commit.hash.clone();
            let report = self
                .pipeline
                .run(commit)
                .await
                .with_context(|| format!("evaluation of commit {hash} failed"))?;
            self.pointer.advance(&hash);
            self.save_cursor().await?;
            reports.push(report);
        }
        Ok(reports)
    }

    /// Tick until `shutdown` resolves or a tick fails.
    ///
    /// Shutdown interrupts an in-flight evaluation; running gate processes
    /// are killed and the cursor still names the last finished commit.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let interval = self.config.poll_interval();
        info!(
            branch = %self.config.code_branch,
            interval_secs = interval.as_secs(),
            mirror = ?self.mirror.path(),
            "watching"
        );
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                result = self.tick() => {
                    result?;
                }
            }
            tokio::select! {
                _ = &mut shutdown => break,
                _ = sleep(interval) => {}
            }
        }
        info!(last = %self.pointer.commit, "shutting down");
        Ok(())
    }
}
