//! Gate process execution.

use std::path::Path;
use std::process::Stdio;
use std::time::Instant;

use tokio::process::Command;
use vigil_core::obs::emit_gate_finished;
use vigil_core::{GateKind, GateResult, GateStatus};

use crate::gate::classify_exit;
use crate::render::{render_diff_html, render_log_html};
use crate::stage::GateCommand;

/// Extension of the files the format gate checks.
pub const SOURCE_EXTENSION: &str = "py";

/// Raw output of one gate process.
#[derive(Debug, Clone)]
pub struct StageOutput {
    /// Exit code (`-1` if killed by a signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

/// Executes gate commands against a checked-out work tree.
pub struct GateRunner;

impl GateRunner {
    /// Execute `argv` in `cwd` and capture its output.
    ///
    /// Fails only when the process cannot be spawned or exceeds the timeout;
    /// a nonzero exit is a successful execution.
    pub async fn execute(
        argv: &[String],
        cwd: &Path,
        timeout_secs: u64,
    ) -> anyhow::Result<StageOutput> {
        let start = Instant::now();

        let (exe, args) = argv
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("gate has empty command"))?;

        let child = Command::new(exe)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| anyhow::anyhow!("failed to spawn {exe}: {e}"))?;

        let output = if timeout_secs > 0 {
            tokio::time::timeout(
                std::time::Duration::from_secs(timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| anyhow::anyhow!("{exe} timed out after {timeout_secs} seconds"))??
        } else {
            child.wait_with_output().await?
        };

        Ok(StageOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Run a gate and shape its outcome into a [`GateResult`].
    ///
    /// Never fails: spawn errors and timeouts become a failed result with
    /// exit code `-1`. `artifact_dir` receives the file behind `{report}`
    /// and must lie outside the work tree.
    pub async fn run(cmd: &GateCommand, worktree: &Path, artifact_dir: &Path) -> GateResult {
        let report_file = artifact_dir.join(cmd.kind.artifact_file());
        let sources = if cmd.wants_sources() {
            match root_sources(worktree, SOURCE_EXTENSION) {
                Ok(sources) => sources,
                Err(e) => return errored(cmd.kind, &format!("listing sources: {e}")),
            }
        } else {
            Vec::new()
        };

        let result = if cmd.wants_sources() && sources.is_empty() {
            tracing::info!(gate = %cmd.kind, "no root sources, gate skipped");
            GateResult {
                gate: cmd.kind,
                status: GateStatus::Passed,
                exit_code: 0,
                artifact: String::new(),
                duration_ms: 0,
            }
        } else {
            Self::run_process(cmd, worktree, &report_file, &sources).await
        };

        emit_gate_finished(
            cmd.kind.name(),
            result.status.name(),
            result.exit_code,
            result.duration_ms,
        );
        result
    }

    async fn run_process(
        cmd: &GateCommand,
        worktree: &Path,
        report_file: &Path,
        sources: &[String],
    ) -> GateResult {
        let argv = cmd.expand(report_file, sources);
        match Self::execute(&argv, worktree, cmd.timeout_secs).await {
            Ok(output) => {
                let status = classify_exit(output.exit_code, cmd.indeterminate_exit_code);
                let artifact = match cmd.kind {
                    GateKind::Test => test_artifact(report_file, &output).await,
                    GateKind::Format => format_artifact(status, &output),
                };
                GateResult {
                    gate: cmd.kind,
                    status,
                    exit_code: output.exit_code,
                    artifact,
                    duration_ms: output.duration_ms,
                }
            }
            Err(e) => errored(cmd.kind, &e.to_string()),
        }
    }
}

fn errored(kind: GateKind, message: &str) -> GateResult {
    tracing::warn!(gate = %kind, error = %message, "gate did not run");
    GateResult {
        gate: kind,
        status: GateStatus::Failed,
        exit_code: -1,
        artifact: render_log_html(&format!("{kind} gate error"), message),
        duration_ms: 0,
    }
}

/// The runner's own report if it wrote one, else its console output.
async fn test_artifact(report_file: &Path, output: &StageOutput) -> String {
    match tokio::fs::read_to_string(report_file).await {
        Ok(html) if !html.trim().is_empty() => html,
        _ => render_log_html("Test report", &combined(output)),
    }
}

/// Diff rendering on failure; nothing on success.
fn format_artifact(status: GateStatus, output: &StageOutput) -> String {
    if status == GateStatus::Passed {
        return String::new();
    }
    if !output.stdout.trim().is_empty() {
        render_diff_html("Formatting diff", &output.stdout)
    } else if !output.stderr.trim().is_empty() {
        render_log_html("Formatting check", &output.stderr)
    } else {
        String::new()
    }
}

fn combined(output: &StageOutput) -> String {
    if output.stderr.trim().is_empty() {
        output.stdout.clone()
    } else {
        format!("{}\n{}", output.stdout, output.stderr)
    }
}

/// Files with `extension` directly at `dir` (non-recursive), sorted.
///
/// Names that are not valid UTF-8 cannot be passed through the argv template;
/// they are skipped with a warning.
pub fn root_sources(dir: &Path, extension: &str) -> std::io::Result<Vec<String>> {
    let mut sources = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some(extension) {
            match entry.file_name().into_string() {
                Ok(name) => sources.push(name),
                Err(name) => {
                    tracing::warn!(file = ?name, "skipping source file with non-UTF-8 name")
                }
            }
        }
    }
    sources.sort();
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(kind: GateKind, script: &str) -> GateCommand {
        GateCommand::custom(
            kind,
            vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            60,
        )
    }

    #[tokio::test]
    async fn test_execute_simple_command() {
        let dir = tempfile::tempdir().unwrap();
        let argv = vec!["echo".to_string(), "hello".to_string()];
        let output = GateRunner::execute(&argv, dir.path(), 60).await.expect("execute failed");
        assert_eq!(output.exit_code, 0);
        assert!(output.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_execute_failing_command() {
        let dir = tempfile::tempdir().unwrap();
        let argv = vec!["false".to_string()];
        let output = GateRunner::execute(&argv, dir.path(), 60).await.expect("execute failed");
        assert_ne!(output.exit_code, 0);
    }

    #[tokio::test]
    async fn test_execute_empty_command_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GateRunner::execute(&[], dir.path(), 60).await.is_err());
    }

    #[tokio::test]
    async fn test_execute_timeout_errors() {
        let dir = tempfile::tempdir().unwrap();
        let argv = vec!["sleep".to_string(), "5".to_string()];
        let err = GateRunner::execute(&argv, dir.path(), 1).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_run_exit_five_is_indeterminate() {
        let tree = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let cmd = sh(GateKind::Test, "echo 'no tests ran'; exit 5").with_indeterminate_exit_code(5);
        let result = GateRunner::run(&cmd, tree.path(), out.path()).await;
        assert_eq!(result.status, GateStatus::Indeterminate);
        assert_eq!(result.exit_code, 5);
        assert!(result.artifact.contains("no tests ran"));
    }

    #[tokio::test]
    async fn test_run_prefers_written_report() {
        let tree = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut cmd = sh(GateKind::Test, "echo '<html>own report</html>' > \"$0\"; exit 1");
        cmd.command.push("{report}".to_string());
        let result = GateRunner::run(&cmd, tree.path(), out.path()).await;
        assert_eq!(result.status, GateStatus::Failed);
        assert!(result.artifact.contains("own report"));
    }

    #[tokio::test]
    async fn test_run_spawn_failure_is_failed_result() {
        let tree = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let cmd = GateCommand::custom(
            GateKind::Test,
            vec!["definitely-not-a-real-binary-vigil".to_string()],
            60,
        );
        let result = GateRunner::run(&cmd, tree.path(), out.path()).await;
        assert_eq!(result.status, GateStatus::Failed);
        assert_eq!(result.exit_code, -1);
        assert!(result.has_artifact());
    }

    #[tokio::test]
    async fn test_format_pass_has_empty_artifact() {
        let tree = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        std::fs::write(tree.path().join("a.py"), "x = 1\n").unwrap();
        let mut cmd = sh(GateKind::Format, "exit 0");
        cmd.command.push("{sources}".to_string());
        let result = GateRunner::run(&cmd, tree.path(), out.path()).await;
        assert!(result.passed());
        assert!(!result.has_artifact());
    }

    #[tokio::test]
    async fn test_format_failure_renders_diff() {
        let tree = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        std::fs::write(tree.path().join("a.py"), "x=1\n").unwrap();
        let mut cmd = sh(
            GateKind::Format,
            "printf '%s\\n' '--- a.py' '+++ a.py' '-x=1' '+x = 1'; exit 1",
        );
        cmd.command.push("{sources}".to_string());
        let result = GateRunner::run(&cmd, tree.path(), out.path()).await;
        assert_eq!(result.status, GateStatus::Failed);
        assert!(result.has_artifact());
        assert!(result.artifact.contains("class=\"add\""));
    }

    #[tokio::test]
    async fn test_format_without_sources_is_skipped() {
        let tree = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut cmd = sh(GateKind::Format, "exit 1");
        cmd.command.push("{sources}".to_string());
        let result = GateRunner::run(&cmd, tree.path(), out.path()).await;
        assert!(result.passed());
    }

    #[test]
    fn test_root_sources_is_non_recursive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.py"), "").unwrap();
        std::fs::write(dir.path().join("a.py"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("pkg")).unwrap();
        std::fs::write(dir.path().join("pkg").join("c.py"), "").unwrap();

        let sources = root_sources(dir.path(), "py").unwrap();
        assert_eq!(sources, vec!["a.py", "b.py"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_root_sources_skips_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let odd = dir.path().join(OsStr::from_bytes(b"bad\xff.py"));
        if std::fs::write(&odd, "").is_err() {
            // Filesystem refuses non-UTF-8 names; nothing to check.
            return;
        }
        std::fs::write(dir.path().join("ok.py"), "").unwrap();

        let sources = root_sources(dir.path(), "py").unwrap();
        assert_eq!(sources, vec!["ok.py"]);
    }
}
