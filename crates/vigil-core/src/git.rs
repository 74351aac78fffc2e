//! Git plumbing used by the watcher.
//!
//! Everything shells out to the `git` binary. Commands never prompt for
//! credentials (`GIT_TERMINAL_PROMPT=0`), so an unreachable or private
//! remote fails fast instead of hanging the loop.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, WatchError};

/// Committer identity used for report commits.
const COMMITTER_NAME: &str = "vigil";
const COMMITTER_EMAIL: &str = "vigil@localhost";

async fn run_git(dir: Option<&Path>, args: &[&str]) -> Result<std::process::Output> {
    let mut cmd = Command::new("git");
    cmd.args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    debug!(args = ?args, "git");
    cmd.output()
        .await
        .map_err(|e| WatchError::Git(format!("failed to run git: {e}")))
}

/// Run git and return trimmed stdout, failing on a nonzero exit.
async fn git_stdout(dir: Option<&Path>, args: &[&str]) -> Result<String> {
    let output = run_git(dir, args).await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(WatchError::Git(format!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Resolve the tip of `branch` on the remote at `url` without a local clone.
///
/// Returns `None` when the remote is reachable but has no such branch.
pub async fn ls_remote_tip(url: &str, branch: &str) -> Result<Option<String>> {
    let refname = format!("refs/heads/{branch}");
    let stdout = git_stdout(None, &["ls-remote", "--heads", url, &refname]).await?;
    Ok(stdout
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .find(|(_, name)| *name == refname)
        .map(|(hash, _)| hash.to_string()))
}

/// Whether `url` answers `git ls-remote`.
pub async fn is_reachable(url: &str) -> bool {
    run_git(None, &["ls-remote", "--heads", url])
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// `git --version`, used as the tool precondition.
pub async fn version() -> Result<String> {
    git_stdout(None, &["--version"]).await
}

/// A local repository the watcher drives.
#[derive(Debug, Clone)]
pub struct GitRepo {
    dir: PathBuf,
}

impl GitRepo {
    /// Wrap an existing local repository.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Clone `url` into `dest`.
    ///
    /// With `branch` set the clone checks that branch out; with `bare` the
    /// clone has no work tree (used for the code mirror, which only serves
    /// objects to worktrees).
    pub async fn clone(url: &str, dest: &Path, branch: Option<&str>, bare: bool) -> Result<Self> {
        let dest_str = dest.to_string_lossy().to_string();
        let mut args = vec!["clone", "--quiet"];
        if bare {
            args.push("--bare");
        }
        if let Some(branch) = branch {
            args.push("--branch");
            args.push(branch);
        }
        args.push(url);
        args.push(&dest_str);
        git_stdout(None, &args).await?;
        Ok(Self::open(dest))
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    async fn git(&self, args: &[&str]) -> Result<String> {
        git_stdout(Some(&self.dir), args).await
    }

    /// Fetch `branch` from origin so its history is available locally.
    pub async fn fetch(&self, branch: &str) -> Result<()> {
        self.git(&["fetch", "--quiet", "origin", &format!("refs/heads/{branch}")])
            .await
            .map(|_| ())
    }

    /// HEAD commit of this repository.
    pub async fn head(&self) -> Result<String> {
        let sha = self.git(&["rev-parse", "HEAD"]).await?;
        if sha.is_empty() {
            return Err(WatchError::Git(
                "git rev-parse HEAD returned empty output".to_string(),
            ));
        }
        Ok(sha)
    }

    /// Whether `hash` names a commit present in this repository.
    pub async fn has_commit(&self, hash: &str) -> bool {
        let rev = format!("{hash}^{{commit}}");
        run_git(Some(&self.dir), &["cat-file", "-e", &rev])
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Whether `ancestor` is reachable from `descendant`.
    pub async fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        let output = run_git(
            Some(&self.dir),
            &["merge-base", "--is-ancestor", ancestor, descendant],
        )
        .await?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(WatchError::Git(format!(
                "git merge-base failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }

    /// Commits in `old..new`, oldest first, as `(hash, author email)` pairs.
    pub async fn log_range(&self, old: &str, new: &str) -> Result<Vec<(String, String)>> {
        let range = format!("{old}..{new}");
        let stdout = self
            .git(&["log", "--reverse", "--topo-order", "--format=%H%x09%ae", &range])
            .await?;
        Ok(stdout
            .lines()
            .filter_map(|line| line.split_once('\t'))
            .map(|(hash, email)| (hash.to_string(), email.to_string()))
            .collect())
    }

    /// Check `commit` out, detached, into a new worktree at `path`.
    pub async fn add_worktree(&self, path: &Path, commit: &str) -> Result<()> {
        let path = path.to_string_lossy();
        self.git(&["worktree", "add", "--detach", "--force", &path, commit])
            .await
            .map(|_| ())
    }

    /// Remove a worktree created by [`GitRepo::add_worktree`].
    pub async fn remove_worktree(&self, path: &Path) -> Result<()> {
        let path = path.to_string_lossy();
        self.git(&["worktree", "remove", "--force", &path]).await?;
        self.git(&["worktree", "prune"]).await.map(|_| ())
    }

    /// Check out `branch` and fast-forward it to origin.
    pub async fn sync_branch(&self, branch: &str) -> Result<()> {
        self.git(&["checkout", "--quiet", branch]).await?;
        self.git(&["pull", "--quiet", "--ff-only", "origin", branch])
            .await
            .map(|_| ())
    }

    /// Stage `path` and commit it with `message`.
    pub async fn commit_path(&self, path: &str, message: &str) -> Result<()> {
        self.git(&["add", "--", path]).await?;
        let name = format!("user.name={COMMITTER_NAME}");
        let email = format!("user.email={COMMITTER_EMAIL}");
        self.git(&["-c", &name, "-c", &email, "commit", "--quiet", "-m", message])
            .await
            .map(|_| ())
    }

    /// Push `branch` to origin. A rejected push is an error.
    pub async fn push_branch(&self, branch: &str) -> Result<()> {
        self.git(&["push", "--quiet", "origin", branch])
            .await
            .map(|_| ())
    }

    /// Point tag `name` at `commit`, discarding any previous binding, and
    /// force-push it to origin.
    pub async fn force_tag(&self, name: &str, commit: &str) -> Result<()> {
        self.git(&["tag", "--force", name, commit]).await?;
        let refspec = format!("refs/tags/{name}");
        self.git(&["push", "--quiet", "--force", "origin", &refspec])
            .await
            .map(|_| ())
    }
}
