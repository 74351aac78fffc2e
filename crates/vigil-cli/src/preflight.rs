//! Checks run before the watch loop starts.
//!
//! Every failure is collected rather than stopping at the first one, so an
//! operator sees the whole list at once.

use std::path::Path;

use vigil_ci::{GateCommand, GateRunner};
use vigil_core::git;
use vigil_core::WatchError;

/// Timeout for each tool install check.
const INSTALL_CHECK_TIMEOUT_SECS: u64 = 30;

/// One failed precondition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub check: &'static str,
    pub message: String,
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.check, self.message)
    }
}

/// A repository that must be reachable and have `branch`.
pub struct RemoteCheck<'a> {
    pub label: &'static str,
    pub url: &'a str,
    pub branch: &'a str,
}

pub fn check_token(token: &str) -> Option<Failure> {
    token.trim().is_empty().then(|| Failure {
        check: "credential",
        message: "GITHUB_TOKEN is not set or empty".to_string(),
    })
}

pub async fn check_remote(remote: &RemoteCheck<'_>) -> Option<Failure> {
    if !git::is_reachable(remote.url).await {
        return Some(Failure {
            check: remote.label,
            message: format!("repository {} is not reachable", remote.url),
        });
    }
    match git::ls_remote_tip(remote.url, remote.branch).await {
        Ok(Some(_)) => None,
        Ok(None) => Some(Failure {
            check: remote.label,
            message: format!("branch {} does not exist in {}", remote.branch, remote.url),
        }),
        Err(e) => Some(Failure {
            check: remote.label,
            message: e.to_string(),
        }),
    }
}

pub async fn check_git() -> Option<Failure> {
    git::version().await.err().map(|e| Failure {
        check: "git",
        message: e.to_string(),
    })
}

/// Run the gate's install check, if it has one.
///
/// A zero exit is not enough when the gate names an expected marker: the
/// check's stdout must also contain it.
pub async fn check_gate(gate: &GateCommand, cwd: &Path) -> Option<Failure> {
    let argv = gate.install_check.as_ref()?;
    let check = match gate.kind {
        vigil_core::GateKind::Test => "test runner",
        vigil_core::GateKind::Format => "formatter",
    };
    match GateRunner::execute(argv, cwd, INSTALL_CHECK_TIMEOUT_SECS).await {
        Ok(out) if out.exit_code == 0 => {
            let marker = gate.install_check_expects.as_deref()?;
            (!out.stdout.contains(marker)).then(|| Failure {
                check,
                message: format!(
                    "`{}` does not offer {marker}; is the HTML report plugin installed?",
                    argv.join(" ")
                ),
            })
        }
        Ok(out) => Some(Failure {
            check,
            message: format!(
                "`{}` exited with {}: {}",
                argv.join(" "),
                out.exit_code,
                out.stderr.trim()
            ),
        }),
        Err(e) => Some(Failure {
            check,
            message: format!("`{}` could not be run: {e}", argv.join(" ")),
        }),
    }
}

/// Run all checks and fold the failures into one precondition error.
pub async fn run(
    token: &str,
    remotes: &[RemoteCheck<'_>],
    gates: &[&GateCommand],
    cwd: &Path,
) -> Result<(), WatchError> {
    let mut failures: Vec<Failure> = check_token(token).into_iter().collect();
    failures.extend(check_git().await);
    for remote in remotes {
        failures.extend(check_remote(remote).await);
    }
    for gate in gates {
        failures.extend(check_gate(gate, cwd).await);
    }

    if failures.is_empty() {
        return Ok(());
    }
    let lines: Vec<String> = failures.iter().map(|f| format!("  - {f}")).collect();
    Err(WatchError::Precondition(format!(
        "{} check(s) failed:\n{}",
        failures.len(),
        lines.join("\n")
    )))
}
