//! Gate classification: exit codes to statuses, status pairs to failures.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use vigil_core::{GatePair, GateStatus};

/// Map a gate exit code to a status.
///
/// 0 passes; `indeterminate` (when configured) is distinguished from an
/// ordinary failure; every other code fails.
pub fn classify_exit(exit_code: i32, indeterminate: Option<i32>) -> GateStatus {
    match exit_code {
        0 => GateStatus::Passed,
        code if Some(code) == indeterminate => GateStatus::Indeterminate,
        _ => GateStatus::Failed,
    }
}

/// Labels attached to filed issues.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssueLabels {
    /// Applied when the test gate failed outright.
    pub test: String,

    /// Applied when the format gate failed.
    pub format: String,
}

impl Default for IssueLabels {
    fn default() -> Self {
        Self {
            test: "res_pytest".to_string(),
            format: "res_black".to_string(),
        }
    }
}

/// Why a commit did not pass. Exactly one variant per non-passing pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Tests indeterminate, format failed.
    TestsMissingFormatFailed,

    /// Tests failed, format failed.
    TestsAndFormatFailed,

    /// Tests indeterminate, format passed.
    TestsMissingFormatPassed,

    /// Tests failed, format passed.
    TestsFailedFormatPassed,

    /// Tests passed, format failed.
    FormatFailed,
}

impl FailureKind {
    /// Classify a pair of statuses; `None` when both passed.
    ///
    /// The format gate has no indeterminate outcome of its own; anything
    /// other than a pass counts as a formatting failure.
    pub fn classify(test: GateStatus, format: GateStatus) -> Option<Self> {
        let format_passed = format == GateStatus::Passed;
        match (test, format_passed) {
            (GateStatus::Passed, true) => None,
            (GateStatus::Passed, false) => Some(FailureKind::FormatFailed),
            (GateStatus::Failed, true) => Some(FailureKind::TestsFailedFormatPassed),
            (GateStatus::Failed, false) => Some(FailureKind::TestsAndFormatFailed),
            (GateStatus::Indeterminate, true) => Some(FailureKind::TestsMissingFormatPassed),
            (GateStatus::Indeterminate, false) => Some(FailureKind::TestsMissingFormatFailed),
        }
    }

    pub fn from_pair(pair: &GatePair) -> Option<Self> {
        Self::classify(pair.test.status, pair.format.status)
    }

    /// Classification sentence used in the issue title and body.
    pub fn summary(&self) -> &'static str {
        match self {
            FailureKind::TestsMissingFormatFailed => {
                "Unit tests do not exist or are broken, and failed formatting test."
            }
            FailureKind::TestsAndFormatFailed => "Failed unit tests and failed formatting test.",
            FailureKind::TestsMissingFormatPassed => {
                "Unit tests do not exist or are broken, formatting test passed."
            }
            FailureKind::TestsFailedFormatPassed => "Failed unit tests, formatting test passed.",
            FailureKind::FormatFailed => "Passed unit tests, but failed formatting test.",
        }
    }

    /// An indeterminate test run is not a code defect and never gets the
    /// test label.
    pub fn tests_failed(&self) -> bool {
        matches!(
            self,
            FailureKind::TestsAndFormatFailed | FailureKind::TestsFailedFormatPassed
        )
    }

    pub fn format_failed(&self) -> bool {
        matches!(
            self,
            FailureKind::TestsMissingFormatFailed
                | FailureKind::TestsAndFormatFailed
                | FailureKind::FormatFailed
        )
    }

    pub fn labels(&self, labels: &IssueLabels) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        if self.tests_failed() {
            set.insert(labels.test.clone());
        }
        if self.format_failed() {
            set.insert(labels.format.clone());
        }
        set
    }
}
