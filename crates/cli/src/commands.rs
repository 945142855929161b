// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command implementations.

use crate::client::DaemonClient;
use crate::daemon_paths;
use anyhow::{anyhow, bail, Context};
use choo_adapters::{CommandProvider, GhForge, PassiveReviewer, SystemGit};
use choo_core::{Event, EventBus, EventHandler, RunConfig};
use choo_engine::{EngineDeps, Orchestrator};
use choo_storage::SnapshotWriter;
use choo_wire::{
    ListJobsParams, Method, ResponseBody, ShutdownParams, StartJobParams, WatchJobParams,
};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Args)]
pub struct RunArgs {
    /// Directory of unit directories
    #[arg(long, default_value = "specs/tasks")]
    pub tasks_dir: PathBuf,

    #[arg(long, default_value_t = 4)]
    pub parallelism: usize,

    #[arg(long, default_value = "main")]
    pub target_branch: String,

    #[arg(long)]
    pub feature_branch: Option<String>,

    /// Merge without waiting for forge review
    #[arg(long)]
    pub skip_review: bool,

    /// Skip the PR lifecycle; commits stay local
    #[arg(long)]
    pub no_pr: bool,

    /// Run a single unit (plus its dependencies)
    #[arg(long)]
    pub unit: Option<String>,

    /// Code-generation provider command
    #[arg(long, default_value = "claude")]
    pub provider: String,

    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,
}

/// Prints one line per event; the CLI's live log observer.
struct LogObserver;

impl EventHandler for LogObserver {
    fn handle(&self, event: &Event) {
        let unit = event.unit.as_deref().unwrap_or("-");
        let mut line = format!("{} {:24} {}", event.time.format("%H:%M:%S"), event.kind, unit);
        if let Some(task) = event.task {
            line.push_str(&format!(" task={task}"));
        }
        if let Some(pr) = event.pr {
            line.push_str(&format!(" pr={pr}"));
        }
        if let Some(error) = &event.error {
            line.push_str(&format!(" error={error}"));
        }
        println!("{line}");
    }
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let repo_root = std::env::current_dir().context("cannot determine working directory")?;

    let mut builder = RunConfig::builder(args.tasks_dir)
        .repo_root(repo_root)
        .parallelism(args.parallelism)
        .target_branch(args.target_branch)
        .skip_review(args.skip_review)
        .no_pr(args.no_pr)
        .max_retries(args.max_retries)
        .provider(args.provider.clone());
    if let Some(branch) = args.feature_branch {
        builder = builder.feature_branch(branch);
    }
    if let Some(unit) = args.unit {
        builder = builder.only_unit(unit);
    }
    let config = builder.build();

    let deps = EngineDeps {
        provider: Arc::new(CommandProvider::new(
            args.provider.as_str().into(),
            args.provider.clone(),
            config.provider_timeout,
        )),
        reviewer: Arc::new(PassiveReviewer),
        git: Arc::new(SystemGit::new()),
        forge: Arc::new(GhForge::new()),
    };

    let bus = EventBus::new();
    bus.subscribe(Arc::new(LogObserver));
    if let Ok(paths) = daemon_paths() {
        let _ = std::fs::create_dir_all(&paths.root);
        bus.subscribe(Arc::new(SnapshotWriter::new(paths.root.join("run-state.json"))));
        // Best-effort live feed for a `choo web` server, if one is up.
        let pusher = choo_web::WebPusher::spawn(paths.web_socket_path, CancellationToken::new());
        bus.subscribe(Arc::new(pusher));
    }

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("choo: interrupted; draining workers");
            signal_cancel.cancel();
        }
    });

    let orchestrator = Orchestrator::new(config, deps, bus.clone(), cancel.clone());
    let summary = orchestrator.run().await?;
    bus.close().await;

    println!(
        "units: {} complete, {} failed, {} blocked (of {})",
        summary.complete, summary.failed, summary.blocked, summary.total
    );

    if cancel.is_cancelled() {
        bail!("cancelled");
    }
    if !summary.succeeded() {
        bail!("run finished with failures");
    }
    Ok(())
}

pub fn daemon_start() -> anyhow::Result<()> {
    // chood lives next to the choo binary.
    let chood = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.join("chood")))
        .filter(|p| p.exists())
        .unwrap_or_else(|| PathBuf::from("chood"));

    std::process::Command::new(chood)
        .spawn()
        .context("cannot spawn chood")?;
    println!("daemon starting");
    Ok(())
}

pub async fn daemon_stop(wait: bool, timeout_sec: u64) -> anyhow::Result<()> {
    let paths = daemon_paths()?;
    let mut client = DaemonClient::connect(&paths.socket_path).await?;
    let response = client
        .call(Method::Shutdown(ShutdownParams {
            wait_for_jobs: wait,
            timeout_sec: Some(timeout_sec),
        }))
        .await?;
    match response.body {
        ResponseBody::Ok { .. } => {
            println!("daemon stopping");
            Ok(())
        }
        ResponseBody::Error { message } => Err(anyhow!(message)),
        other => Err(anyhow!("unexpected response: {other:?}")),
    }
}

pub async fn daemon_status() -> anyhow::Result<()> {
    let paths = daemon_paths()?;
    let mut client = DaemonClient::connect(&paths.socket_path).await?;
    match client.call(Method::Health).await?.body {
        ResponseBody::Health { healthy, active_jobs, version } => {
            println!("healthy: {healthy}\nactive jobs: {active_jobs}\nversion: {version}");
            Ok(())
        }
        other => Err(anyhow!("unexpected response: {other:?}")),
    }
}

pub async fn jobs(status: Vec<String>) -> anyhow::Result<()> {
    let paths = daemon_paths()?;
    let mut client = DaemonClient::connect(&paths.socket_path).await?;
    let params =
        ListJobsParams { status: if status.is_empty() { None } else { Some(status) } };
    match client.call(Method::ListJobs(params)).await?.body {
        ResponseBody::Jobs { jobs } => {
            for job in jobs {
                println!(
                    "{}  {:9}  {}  {}/{}",
                    job.job_id,
                    job.status.to_string(),
                    job.started_at.format("%Y-%m-%d %H:%M:%S"),
                    job.units_complete,
                    job.units_total
                );
            }
            Ok(())
        }
        ResponseBody::Error { message } => Err(anyhow!(message)),
        other => Err(anyhow!("unexpected response: {other:?}")),
    }
}

pub async fn watch(job_id: String, from_seq: u64) -> anyhow::Result<()> {
    let paths = daemon_paths()?;
    let mut client = DaemonClient::connect(&paths.socket_path).await?;

    let mut response =
        client.call(Method::WatchJob(WatchJobParams { job_id, from_seq })).await?;
    let observer = LogObserver;
    loop {
        match response.body {
            ResponseBody::WatchEvent { event, .. } => observer.handle(&event),
            ResponseBody::WatchEnd { last_seq } => {
                println!("watch ended at seq {last_seq}");
                return Ok(());
            }
            ResponseBody::Error { message } => return Err(anyhow!(message)),
            other => return Err(anyhow!("unexpected response: {other:?}")),
        }
        response = client.next_response().await?;
    }
}

#[derive(Args)]
pub struct ArchiveArgs {
    #[arg(long, default_value = "specs/tasks")]
    pub tasks_dir: PathBuf,

    #[arg(long, default_value = "specs/completed")]
    pub completed_dir: PathBuf,

    /// Archive one unit; default archives every fully complete unit
    pub unit: Option<String>,
}

pub fn archive(args: ArchiveArgs) -> anyhow::Result<()> {
    let units: Vec<String> = match args.unit {
        Some(unit) => vec![unit],
        None => choo_discovery::discover(&args.tasks_dir)?
            .into_iter()
            .filter(|u| u.status == choo_core::UnitStatus::Complete)
            .map(|u| u.id)
            .collect(),
    };

    if units.is_empty() {
        println!("nothing to archive");
        return Ok(());
    }
    for unit in units {
        let dest = choo_discovery::archive_unit(&args.tasks_dir, &args.completed_dir, &unit)?;
        println!("archived {unit} -> {}", dest.display());
    }
    Ok(())
}

#[derive(Args)]
pub struct CleanupArgs {
    #[arg(long, default_value = "specs/tasks")]
    pub tasks_dir: PathBuf,

    /// Reset orchestrator-owned front-matter keys to null
    #[arg(long)]
    pub reset_state: bool,

    /// Also delete retained worktrees (failed units keep theirs otherwise)
    #[arg(long)]
    pub nuke: bool,

    #[arg(long, default_value = ".choo/worktrees")]
    pub worktree_base: PathBuf,
}

pub fn cleanup(args: CleanupArgs) -> anyhow::Result<()> {
    if args.reset_state {
        for unit in choo_discovery::discover(&args.tasks_dir)? {
            choo_discovery::reset_state(&unit.path)?;
            println!("reset {}", unit.id);
        }
    }
    if args.nuke && args.worktree_base.exists() {
        std::fs::remove_dir_all(&args.worktree_base)
            .with_context(|| format!("removing {}", args.worktree_base.display()))?;
        println!("removed {}", args.worktree_base.display());
    }
    Ok(())
}

#[derive(Args)]
pub struct WebArgs {
    #[arg(long, default_value = "127.0.0.1:8337")]
    pub addr: std::net::SocketAddr,

    /// Directory of static UI assets
    #[arg(long, default_value = "web")]
    pub static_dir: PathBuf,
}

pub async fn web(args: WebArgs) -> anyhow::Result<()> {
    let paths = daemon_paths()?;
    paths.ensure()?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    choo_web::serve(paths.web_socket_path.clone(), args.addr, args.static_dir, cancel).await?;
    Ok(())
}

/// Submit a job to the daemon instead of running in-process.
pub async fn start(args: RunArgs) -> anyhow::Result<()> {
    let paths = daemon_paths()?;
    let mut client = DaemonClient::connect(&paths.socket_path).await?;

    let tasks_dir = if args.tasks_dir.is_absolute() {
        args.tasks_dir.clone()
    } else {
        std::env::current_dir()?.join(&args.tasks_dir)
    };
    let params = StartJobParams {
        tasks_dir,
        parallelism: Some(args.parallelism),
        target_branch: Some(args.target_branch.clone()),
        feature_branch: args.feature_branch.clone(),
        skip_review: args.skip_review,
        no_pr: args.no_pr,
        unit: args.unit.clone(),
        provider: Some(args.provider.clone()),
    };

    match client.call(Method::StartJob(params)).await?.body {
        ResponseBody::JobStarted { job_id } => {
            println!("{job_id}");
            Ok(())
        }
        ResponseBody::Error { message } => Err(anyhow!(message)),
        other => Err(anyhow!("unexpected response: {other:?}")),
    }
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
