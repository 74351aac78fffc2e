//! Publication of gate artifacts to the report repository.
//!
//! The report repository is cloned once per run and reused for every
//! commit. Only one watcher may publish to a given report branch at a time.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::info;
use vigil_core::domain::report::artifact_url;
use vigil_core::error::{Result, WatchError};
use vigil_core::obs::emit_report_published;
use vigil_core::{CommitRecord, GateKind, GatePair, GitRepo, PublishedArtifact, RepoSlug};

/// Allocate a report path for `commit` at `now` that does not exist under
/// `root`.
///
/// Layout: `<YYYY-MM-DD>/<hash>-<HHMMSS>-<nanos>`, with a `-<n>` suffix when
/// two publications land on the same nanosecond.
pub fn allocate_report_path(root: &Path, commit: &str, now: DateTime<Utc>) -> String {
    let base = format!(
        "{}/{}-{}",
        now.format("%Y-%m-%d"),
        commit,
        now.format("%H%M%S-%f")
    );
    if !root.join(&base).exists() {
        return base;
    }
    (1u32..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !root.join(candidate).exists())
        .unwrap_or(base)
}

/// Writes gate artifacts into the report repository and pushes them.
pub struct ReportPublisher {
    url: String,
    branch: String,
    slug: RepoSlug,
    checkout_dir: PathBuf,
    repo: OnceCell<GitRepo>,
}

impl ReportPublisher {
    /// `checkout_dir` is where the working copy will be cloned on first use.
    pub fn new(url: &str, branch: &str, checkout_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            url: url.to_string(),
            branch: branch.to_string(),
            slug: RepoSlug::parse(url)?,
            checkout_dir: checkout_dir.into(),
            repo: OnceCell::new(),
        })
    }

    /// The working copy, cloned on first call and cached afterwards.
    async fn working_copy(&self) -> Result<&GitRepo> {
        self.repo
            .get_or_try_init(|| async {
                if self.checkout_dir.join(".git").exists() {
                    return Ok(GitRepo::open(&self.checkout_dir));
                }
                info!(url = %self.url, dir = ?self.checkout_dir, "cloning report repository");
                GitRepo::clone(&self.url, &self.checkout_dir, Some(&self.branch), false).await
            })
            .await
    }

    /// Publish the artifacts of one evaluation as a single commit.
    ///
    /// The test artifact is always written; the format artifact only when
    /// non-empty. Any git failure (including a rejected push) is returned as
    /// [`WatchError::Publish`] naming the commit.
    pub async fn publish(
        &self,
        commit: &CommitRecord,
        gates: &GatePair,
    ) -> Result<Vec<PublishedArtifact>> {
        self.publish_inner(commit, gates)
            .await
            .map_err(|e| match e {
                WatchError::Publish { .. } => e,
                other => WatchError::Publish {
                    commit: commit.hash.clone(),
                    reason: other.to_string(),
                },
            })
    }

    async fn publish_inner(
        &self,
        commit: &CommitRecord,
        gates: &GatePair,
    ) -> Result<Vec<PublishedArtifact>> {
        let repo = self.working_copy().await?;
        repo.sync_branch(&self.branch).await?;

        let report_path = allocate_report_path(repo.path(), &commit.hash, Utc::now());
        let dir = repo.path().join(&report_path);
        tokio::fs::create_dir_all(&dir).await?;

        let mut written = vec![(GateKind::Test, &gates.test.artifact)];
        if gates.format.has_artifact() {
            written.push((GateKind::Format, &gates.format.artifact));
        }
        for (kind, content) in &written {
            tokio::fs::write(dir.join(kind.artifact_file()), content.as_bytes()).await?;
        }

        repo.commit_path(&report_path, &format!("Add gate reports for {}", commit.hash))
            .await?;
        let report_commit = repo.head().await?;
        repo.push_branch(&self.branch).await?;

        emit_report_published(&report_path, &report_commit, written.len());

        Ok(written
            .into_iter()
            .map(|(kind, _)| PublishedArtifact {
                commit: commit.hash.clone(),
                gate: kind,
                url: artifact_url(
                    &self.slug.owner,
                    &self.slug.name,
                    &report_path,
                    kind.artifact_file(),
                ),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_report_path_layout() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 10, 15, 0).unwrap();
        let path = allocate_report_path(dir.path(), "abc1234", now);
        assert_eq!(path, "2026-10-17/abc1234-101500-000000000");
    }

    #[test]
    fn test_report_path_never_collides() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 10, 15, 0).unwrap();

        let first = allocate_report_path(dir.path(), "abc1234", now);
        std::fs::create_dir_all(dir.path().join(&first)).unwrap();
        let second = allocate_report_path(dir.path(), "abc1234", now);
        std::fs::create_dir_all(dir.path().join(&second)).unwrap();
        let third = allocate_report_path(dir.path(), "abc1234", now);

        assert_ne!(first, second);
        assert_ne!(second, third);
        assert_eq!(second, format!("{first}-1"));
        assert_eq!(third, format!("{first}-2"));
    }

    #[test]
    fn test_new_rejects_unparseable_url() {
        assert!(ReportPublisher::new("reports", "gh-pages", "/tmp/x").is_err());
    }
}
