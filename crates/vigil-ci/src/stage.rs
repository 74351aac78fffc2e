//! Gate command definitions and configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use vigil_core::GateKind;

/// Placeholder replaced by the absolute path of the artifact file.
pub const REPORT_TOKEN: &str = "{report}";

/// Placeholder argument expanded to the source files at the work-tree root.
pub const SOURCES_TOKEN: &str = "{sources}";

/// Exit code pytest uses for "no tests were collected".
pub const PYTEST_NO_TESTS_EXIT_CODE: i32 = 5;

/// Builtin gate tools.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinGate {
    /// python3 -m pytest --verbose --html={report} --self-contained-html
    Pytest,

    /// black --check --diff {sources}
    Black,
}

impl BuiltinGate {
    /// Which gate slot this tool fills.
    pub fn kind(&self) -> GateKind {
        match self {
            BuiltinGate::Pytest => GateKind::Test,
            BuiltinGate::Black => GateKind::Format,
        }
    }

    /// Get the gate's main command.
    pub fn command(&self) -> Vec<String> {
        match self {
            BuiltinGate::Pytest => vec![
                "python3".to_string(),
                "-m".to_string(),
                "pytest".to_string(),
                "--verbose".to_string(),
                format!("--html={REPORT_TOKEN}"),
                "--self-contained-html".to_string(),
            ],
            BuiltinGate::Black => vec![
                "black".to_string(),
                "--check".to_string(),
                "--diff".to_string(),
                SOURCES_TOKEN.to_string(),
            ],
        }
    }

    /// Command proving the tool is installed.
    ///
    /// For pytest this is `--help`, whose option list only mentions `--html`
    /// when the HTML report plugin is loaded.
    pub fn install_check_command(&self) -> Vec<String> {
        match self {
            BuiltinGate::Pytest => vec![
                "python3".to_string(),
                "-m".to_string(),
                "pytest".to_string(),
                "--help".to_string(),
            ],
            BuiltinGate::Black => vec!["black".to_string(), "--version".to_string()],
        }
    }

    /// Text the install check's stdout must contain.
    pub fn install_check_marker(&self) -> Option<&'static str> {
        match self {
            BuiltinGate::Pytest => Some("--html"),
            BuiltinGate::Black => None,
        }
    }

    /// Exit code that means the gate could not meaningfully run.
    pub fn indeterminate_exit_code(&self) -> Option<i32> {
        match self {
            BuiltinGate::Pytest => Some(PYTEST_NO_TESTS_EXIT_CODE),
            BuiltinGate::Black => None,
        }
    }
}

/// Configuration for one gate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateCommand {
    /// Gate slot this command fills.
    pub kind: GateKind,

    /// Command template (first element is the executable).
    pub command: Vec<String>,

    /// Optional command proving the tool is installed.
    pub install_check: Option<Vec<String>>,

    /// Text the install check must print for the tool to count as usable.
    #[serde(default)]
    pub install_check_expects: Option<String>,

    /// Exit code classified as indeterminate instead of failed.
    pub indeterminate_exit_code: Option<i32>,

    /// Timeout in seconds (0 = none).
    pub timeout_secs: u64,
}

impl GateCommand {
    /// Create a gate configuration from a builtin tool.
    pub fn from_builtin(gate: BuiltinGate, timeout_secs: u64) -> Self {
        Self {
            kind: gate.kind(),
            command: gate.command(),
            install_check: Some(gate.install_check_command()),
            install_check_expects: gate.install_check_marker().map(str::to_string),
            indeterminate_exit_code: gate.indeterminate_exit_code(),
            timeout_secs,
        }
    }

    /// Create a custom gate configuration.
    pub fn custom(kind: GateKind, command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            kind,
            command,
            install_check: None,
            install_check_expects: None,
            indeterminate_exit_code: None,
            timeout_secs,
        }
    }

    /// Classify `code` as indeterminate.
    pub fn with_indeterminate_exit_code(mut self, code: i32) -> Self {
        self.indeterminate_exit_code = Some(code);
        self
    }

    /// Whether the template wants the root source list.
    pub fn wants_sources(&self) -> bool {
        self.command.iter().any(|arg| arg == SOURCES_TOKEN)
    }

    /// Expand placeholders into a concrete argv.
    pub fn expand(&self, report: &Path, sources: &[String]) -> Vec<String> {
        let report = report.to_string_lossy();
        let mut argv = Vec::with_capacity(self.command.len() + sources.len());
        for arg in &self.command {
            if arg == SOURCES_TOKEN {
                argv.extend(sources.iter().cloned());
            } else {
                argv.push(arg.replace(REPORT_TOKEN, &report));
            }
        }
        argv
    }
}
