// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! chood: the choo daemon.

use choo_adapters::{CommandProvider, GhForge, PassiveReviewer, SystemGit};
use choo_daemon::{run_listener, DaemonPaths, JobManager, ListenCtx, PidLock};
use choo_engine::EngineDeps;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UnixListener;
use tokio::sync::Notify;
use tracing::{error, info};

fn main() {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("chood: cannot start runtime: {e}");
            std::process::exit(1);
        }
    };
    let code = runtime.block_on(run());
    std::process::exit(code);
}

async fn run() -> i32 {
    let paths = match resolve_paths() {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("chood: {e}");
            return 1;
        }
    };
    if let Err(e) = paths.ensure() {
        eprintln!("chood: {e}");
        return 1;
    }

    // File logging with daily rotation; RUST_LOG filters as usual.
    let file_appender = tracing_appender::rolling::daily(&paths.root, "daemon.log");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    let pid_lock = match PidLock::acquire(&paths) {
        Ok(lock) => lock,
        Err(e) => {
            eprintln!("chood: {e}");
            return 1;
        }
    };

    // A previous unclean shutdown may have left the socket file behind;
    // the pid lock already proved no daemon owns it.
    let _ = std::fs::remove_file(&paths.socket_path);
    let listener = match UnixListener::bind(&paths.socket_path) {
        Ok(listener) => listener,
        Err(e) => {
            error!("cannot bind {}: {e}", paths.socket_path.display());
            pid_lock.release();
            return 1;
        }
    };

    let provider_timeout = Duration::from_secs(30 * 60);
    let deps: choo_daemon::JobDeps = Arc::new(move || EngineDeps {
        provider: Arc::new(CommandProvider::claude(provider_timeout)),
        reviewer: Arc::new(PassiveReviewer),
        git: Arc::new(SystemGit::new()),
        forge: Arc::new(GhForge::new()),
    });

    let jobs = Arc::new(JobManager::new(paths.jobs_dir.clone(), deps));
    let shutdown = Arc::new(Notify::new());
    let ctx = Arc::new(ListenCtx { jobs: Arc::clone(&jobs), shutdown: Arc::clone(&shutdown) });

    info!(socket = %paths.socket_path.display(), "chood listening");
    println!("READY");
    let listener_task = tokio::spawn(run_listener(listener, ctx));

    // Run until a shutdown request or a termination signal.
    let mut exit_code = 0;
    tokio::select! {
        _ = shutdown.notified() => {
            info!("shutting down (client request)");
        }
        _ = signal_terminate() => {
            info!("shutting down (signal)");
            jobs.stop_accepting();
            jobs.cancel_all(true);
            let _ = jobs.wait_for_jobs(Duration::from_secs(5)).await;
            exit_code = 130;
        }
    }

    listener_task.abort();
    let _ = std::fs::remove_file(&paths.socket_path);
    pid_lock.release();
    exit_code
}

fn resolve_paths() -> Result<DaemonPaths, choo_daemon::LifecycleError> {
    match std::env::var_os("CHOO_HOME") {
        Some(root) => Ok(DaemonPaths::under(root)),
        None => DaemonPaths::resolve(),
    }
}

async fn signal_terminate() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            error!("cannot install SIGTERM handler: {e}");
            std::future::pending::<()>().await;
            return;
        }
    };
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = tokio::signal::ctrl_c() => {}
    }
}
