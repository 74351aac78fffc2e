//! Gate outcomes.

use serde::{Deserialize, Serialize};

/// The two quality gates every commit goes through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    /// Unit test suite.
    Test,

    /// Check-only formatter pass.
    Format,
}

impl GateKind {
    pub fn name(&self) -> &'static str {
        match self {
            GateKind::Test => "test",
            GateKind::Format => "format",
        }
    }

    /// File name of this gate's artifact inside a report path.
    pub fn artifact_file(&self) -> &'static str {
        match self {
            GateKind::Test => "pytest.html",
            GateKind::Format => "black.html",
        }
    }
}

impl std::fmt::Display for GateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a gate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Passed,
    Failed,
    /// The check could not meaningfully run (e.g. no tests collected).
    Indeterminate,
}

impl GateStatus {
    pub fn name(&self) -> &'static str {
        match self {
            GateStatus::Passed => "passed",
            GateStatus::Failed => "failed",
            GateStatus::Indeterminate => "indeterminate",
        }
    }
}

/// Result of one gate against one commit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateResult {
    pub gate: GateKind,
    pub status: GateStatus,

    /// Process exit code, `-1` when the process never produced one.
    pub exit_code: i32,

    /// Rendered artifact (HTML). May be empty.
    pub artifact: String,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl GateResult {
    pub fn passed(&self) -> bool {
        self.status == GateStatus::Passed
    }

    pub fn has_artifact(&self) -> bool {
        !self.artifact.trim().is_empty()
    }
}

/// Both gate results for a single commit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatePair {
    pub test: GateResult,
    pub format: GateResult,
}

impl GatePair {
    pub fn all_passed(&self) -> bool {
        self.test.passed() && self.format.passed()
    }
}
