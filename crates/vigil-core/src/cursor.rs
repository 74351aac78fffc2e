//! Durable record of the last fully processed commit.
//!
//! The branch pointer alone cannot tell a restarted watcher which commits
//! already got their issue or tag. The cursor is saved after each commit
//! completes, so a restart resumes with the first unprocessed commit.
//!
//! - `CursorStore`: the storage abstraction
//! - `FsCursorStore`: one JSON file per `{repository, branch}`
//! - `MemoryCursorStore`: in-memory fake for tests

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, WatchError};

/// Persisted cursor for one tracked branch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cursor {
    pub repository: String,
    pub branch: String,

    /// Last commit whose pipeline finished.
    pub commit: String,

    pub updated_at: DateTime<Utc>,
}

impl Cursor {
    pub fn new(repository: &str, branch: &str, commit: &str) -> Self {
        Self {
            repository: repository.to_string(),
            branch: branch.to_string(),
            commit: commit.to_string(),
            updated_at: Utc::now(),
        }
    }
}

/// Deterministic key for a `{repository, branch}` pair.
pub fn cursor_key(repository: &str, branch: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(repository.as_bytes());
    hasher.update(b"\0");
    hasher.update(branch.as_bytes());
    hex::encode(hasher.finalize())
}

/// Storage for cursors.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Load the cursor for a branch, `None` if never saved.
    async fn load(&self, repository: &str, branch: &str) -> Result<Option<Cursor>>;

    /// Save (overwrite) the cursor for its branch.
    async fn save(&self, cursor: &Cursor) -> Result<()>;
}

/// Cursor files under a state directory.
#[derive(Debug, Clone)]
pub struct FsCursorStore {
    root: PathBuf,
}

impl FsCursorStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, repository: &str, branch: &str) -> PathBuf {
        let key = cursor_key(repository, branch);
        self.root.join(format!("cursor-{}.json", &key[..16]))
    }
}

#[async_trait]
impl CursorStore for FsCursorStore {
    async fn load(&self, repository: &str, branch: &str) -> Result<Option<Cursor>> {
        let path = self.path_for(repository, branch);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(WatchError::Cursor(format!("read {:?}: {e}", path))),
        };
        let cursor: Cursor = serde_json::from_slice(&bytes)?;
        if cursor.repository != repository || cursor.branch != branch {
            return Err(WatchError::Cursor(format!(
                "{:?} belongs to {} {}",
                path, cursor.repository, cursor.branch
            )));
        }
        Ok(Some(cursor))
    }

    async fn save(&self, cursor: &Cursor) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.path_for(&cursor.repository, &cursor.branch);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_vec_pretty(cursor)?;
        // Replace atomically: write a sibling, then rename over.
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

/// In-memory cursor store (testing only).
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    cursors: Mutex<HashMap<String, Cursor>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn load(&self, repository: &str, branch: &str) -> Result<Option<Cursor>> {
        let cursors = self.cursors.lock().unwrap();
        Ok(cursors.get(&cursor_key(repository, branch)).cloned())
    }

    async fn save(&self, cursor: &Cursor) -> Result<()> {
        let mut cursors = self.cursors.lock().unwrap();
        cursors.insert(cursor_key(&cursor.repository, &cursor.branch), cursor.clone());
        Ok(())
    }
}
