//! Owner/name identity of a hosted repository.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WatchError};

/// `owner/name` of a repository on the host platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

fn slug_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Last two path segments, separated by '/' or the ':' of scp-style URLs.
    PATTERN.get_or_init(|| {
        Regex::new(r"([^/:]+)[/:]([^/:]+?)(?:\.git)?/?$").expect("slug pattern is valid")
    })
}

impl RepoSlug {
    /// Parse a clone URL.
    ///
    /// Accepts `https://host/owner/name(.git)`, `git@host:owner/name.git`
    /// and plain paths ending in `owner/name(.git)`.
    pub fn parse(url: &str) -> Result<Self> {
        let caps = slug_pattern()
            .captures(url.trim())
            .ok_or_else(|| WatchError::InvalidRepoUrl(url.to_string()))?;
        Ok(Self {
            owner: caps[1].to_string(),
            name: caps[2].to_string(),
        })
    }
}

impl std::fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
