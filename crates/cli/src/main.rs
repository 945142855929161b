// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! choo: parallel development-unit orchestrator CLI.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Exit code when a run is interrupted by a signal.
const EXIT_CANCELLED: i32 = 130;

#[derive(Parser)]
#[command(name = "choo", version, about = "Parallel development-unit orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the orchestrator in-process over a tasks directory
    Run(commands::RunArgs),

    /// Submit a job to the daemon
    Start(commands::RunArgs),

    /// Daemon control
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },

    /// List daemon jobs
    Jobs {
        /// Filter by status (running, completed, failed, stopped)
        #[arg(long)]
        status: Vec<String>,
    },

    /// Stream a daemon job's events
    Watch {
        job_id: String,
        /// Resume from this sequence number (0 = from job start)
        #[arg(long, default_value_t = 0)]
        from_seq: u64,
    },

    /// Move completed units into the archive
    Archive(commands::ArchiveArgs),

    /// Clean orchestrator state
    Cleanup(commands::CleanupArgs),

    /// Serve the live web UI
    Web(commands::WebArgs),

    /// Print the version
    Version,
}

#[derive(Subcommand)]
enum DaemonAction {
    /// Start the daemon (spawns chood)
    Start,
    /// Stop the daemon
    Stop {
        /// Wait for active jobs to finish first
        #[arg(long)]
        wait: bool,
        #[arg(long, default_value_t = 60)]
        timeout_sec: u64,
    },
    /// Query daemon health
    Status,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("choo: cannot start runtime: {e}");
            std::process::exit(1);
        }
    };

    let code = runtime.block_on(async {
        match cli.command {
            Command::Run(args) => commands::run(args).await,
            Command::Start(args) => commands::start(args).await,
            Command::Daemon { action } => match action {
                DaemonAction::Start => commands::daemon_start(),
                DaemonAction::Stop { wait, timeout_sec } => {
                    commands::daemon_stop(wait, timeout_sec).await
                }
                DaemonAction::Status => commands::daemon_status().await,
            },
            Command::Jobs { status } => commands::jobs(status).await,
            Command::Watch { job_id, from_seq } => commands::watch(job_id, from_seq).await,
            Command::Archive(args) => commands::archive(args),
            Command::Cleanup(args) => commands::cleanup(args),
            Command::Web(args) => commands::web(args).await,
            Command::Version => {
                println!("choo {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
        .map_or_else(
            |e| {
                if e.to_string() == "cancelled" {
                    EXIT_CANCELLED
                } else {
                    eprintln!("choo: {e:#}");
                    1
                }
            },
            |_| 0,
        )
    });
    std::process::exit(code);
}

/// Daemon state root: `$CHOO_HOME` override or `~/.choo`.
pub(crate) fn daemon_paths() -> anyhow::Result<choo_daemon::DaemonPaths> {
    match std::env::var_os("CHOO_HOME") {
        Some(root) => Ok(choo_daemon::DaemonPaths::under(PathBuf::from(root))),
        None => Ok(choo_daemon::DaemonPaths::resolve()?),
    }
}
