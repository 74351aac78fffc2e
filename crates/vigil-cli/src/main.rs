//! Vigil - continuous verification watcher
//!
//! The `vigil` command watches one branch of a code repository and, for
//! every new commit, runs the test and format gates, publishes their reports
//! and files an issue or moves the known-good tag.
//!
//! ## Commands
//!
//! - `watch`: check preconditions, then run the watch loop until signalled
//! - `check`: check preconditions only
//!
//! The host API token is read from `GITHUB_TOKEN`; there is no flag for it.

mod preflight;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, Level};

use vigil_ci::config::{DEFAULT_GATE_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_SECS};
use vigil_ci::github::DEFAULT_API_URL;
use vigil_ci::{GitHubClient, WatchConfig, Watcher};
use vigil_core::FsCursorStore;

/// Exit code for a failed precondition.
const PRECONDITION_EXIT: u8 = 2;

/// Environment variable holding the host API token.
const TOKEN_ENV: &str = "GITHUB_TOKEN";

#[derive(Parser)]
#[command(name = "vigil")]
#[command(author = "Vigil Maintainers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Continuous verification watcher for a git branch", long_about = None)]
#[command(after_help = "The host API token is read from the GITHUB_TOKEN environment variable.")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the code branch until interrupted
    Watch(WatchArgs),

    /// Verify credentials, repositories, branches and tools, then exit
    Check(WatchArgs),
}

#[derive(Args, Clone)]
struct WatchArgs {
    /// Code repository clone URL
    #[arg(long, env = "VIGIL_CODE_REPO")]
    code_repo: String,

    /// Branch of the code repository to watch
    #[arg(long, env = "VIGIL_CODE_BRANCH")]
    code_branch: String,

    /// Report repository clone URL (served as a static site)
    #[arg(long, env = "VIGIL_REPORT_REPO")]
    report_repo: String,

    /// Branch the report site publishes from
    #[arg(long, env = "VIGIL_REPORT_BRANCH")]
    report_branch: String,

    /// Host API base URL
    #[arg(long, env = "VIGIL_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Seconds between polls
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    poll_interval_secs: u64,

    /// Seconds before a gate process is killed (0 = never)
    #[arg(long, default_value_t = DEFAULT_GATE_TIMEOUT_SECS)]
    gate_timeout_secs: u64,

    /// Directory holding the durable cursor
    #[arg(long, env = "VIGIL_STATE_DIR", default_value = ".vigil")]
    state_dir: PathBuf,

    /// Reuse an open issue that already names the commit
    #[arg(long)]
    dedupe_issues: bool,
}

impl WatchArgs {
    fn into_config(self, token: &str) -> WatchConfig {
        let mut config = WatchConfig::new(
            &self.code_repo,
            &self.code_branch,
            &self.report_repo,
            &self.report_branch,
            token,
        )
        .with_gate_timeout(self.gate_timeout_secs);
        config.api_url = self.api_url;
        config.poll_interval_secs = self.poll_interval_secs;
        config.state_dir = self.state_dir;
        config.dedupe_issues = self.dedupe_issues;
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    vigil_core::init_tracing(cli.json, level);

    let token = std::env::var(TOKEN_ENV).unwrap_or_default();
    let (config, watch) = match cli.command {
        Commands::Watch(args) => (args.into_config(&token), true),
        Commands::Check(args) => (args.into_config(&token), false),
    };

    if let Err(e) = check_preconditions(&config).await {
        eprintln!("vigil: {e}");
        return ExitCode::from(PRECONDITION_EXIT);
    }
    if !watch {
        println!("all preconditions hold");
        return ExitCode::SUCCESS;
    }

    match cmd_watch(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = ?e, "watcher stopped");
            eprintln!("vigil: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn check_preconditions(config: &WatchConfig) -> Result<(), vigil_core::WatchError> {
    let cwd = std::env::current_dir()?;
    preflight::run(
        &config.token,
        &[
            preflight::RemoteCheck {
                label: "code repository",
                url: &config.code_repo,
                branch: &config.code_branch,
            },
            preflight::RemoteCheck {
                label: "report repository",
                url: &config.report_repo,
                branch: &config.report_branch,
            },
        ],
        &[&config.test_gate, &config.format_gate],
        &cwd,
    )
    .await
}

/// Run the watch loop until SIGINT or SIGTERM.
async fn cmd_watch(config: WatchConfig) -> Result<()> {
    info!(config = ?config, "starting watcher");

    let tracker = Arc::new(
        GitHubClient::new(&config.api_url, &config.token)
            .context("Failed to build API client")?,
    );
    let cursor = Arc::new(FsCursorStore::new(&config.state_dir));

    let mut watcher = Watcher::prepare(config, tracker, cursor)
        .await
        .context("Failed to prepare watcher")?;
    watcher.run(shutdown_signal()).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}
