//! Watcher configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::gate::IssueLabels;
use crate::github::DEFAULT_API_URL;
use crate::stage::{BuiltinGate, GateCommand};

/// Default delay between polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;

/// Default per-gate timeout.
pub const DEFAULT_GATE_TIMEOUT_SECS: u64 = 1800;

/// Everything the watcher needs to run.
#[derive(Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Code repository clone URL.
    pub code_repo: String,

    /// Tracked branch of the code repository.
    pub code_branch: String,

    /// Report repository clone URL.
    pub report_repo: String,

    /// Branch the report repository publishes from.
    pub report_branch: String,

    /// Bearer credential for the host API. Never serialized.
    #[serde(skip)]
    pub token: String,

    /// Host API base URL.
    pub api_url: String,

    /// Delay between polls, in seconds.
    pub poll_interval_secs: u64,

    /// Where the durable cursor lives.
    pub state_dir: PathBuf,

    /// Look up an open issue for the commit before filing a new one.
    pub dedupe_issues: bool,

    pub labels: IssueLabels,
    pub test_gate: GateCommand,
    pub format_gate: GateCommand,
}

impl WatchConfig {
    /// Configuration with builtin gates and default tuning.
    pub fn new(
        code_repo: &str,
        code_branch: &str,
        report_repo: &str,
        report_branch: &str,
        token: &str,
    ) -> Self {
        Self {
            code_repo: code_repo.to_string(),
            code_branch: code_branch.to_string(),
            report_repo: report_repo.to_string(),
            report_branch: report_branch.to_string(),
            token: token.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            state_dir: PathBuf::from(".vigil"),
            dedupe_issues: false,
            labels: IssueLabels::default(),
            test_gate: GateCommand::from_builtin(BuiltinGate::Pytest, DEFAULT_GATE_TIMEOUT_SECS),
            format_gate: GateCommand::from_builtin(BuiltinGate::Black, DEFAULT_GATE_TIMEOUT_SECS),
        }
    }

    /// Apply one timeout to both gates.
    pub fn with_gate_timeout(mut self, secs: u64) -> Self {
        self.test_gate.timeout_secs = secs;
        self.format_gate.timeout_secs = secs;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl std::fmt::Debug for WatchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchConfig")
            .field("code_repo", &self.code_repo)
            .field("code_branch", &self.code_branch)
            .field("report_repo", &self.report_repo)
            .field("report_branch", &self.report_branch)
            .field("token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("state_dir", &self.state_dir)
            .field("dedupe_issues", &self.dedupe_issues)
            .field("labels", &self.labels)
            .field("test_gate", &self.test_gate)
            .field("format_gate", &self.format_gate)
            .finish()
    }
}
