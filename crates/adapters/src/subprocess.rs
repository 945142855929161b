// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded subprocess execution.
//!
//! Every external command the orchestrator runs goes through here: a
//! wall-clock ceiling, cooperative cancellation, and SIGTERM-then-SIGKILL
//! escalation with a grace window. A non-zero exit is not an error at
//! this layer; callers inspect [`CommandOutput::code`].

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Default SIGTERM-to-SIGKILL grace window.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("{label}: failed to spawn: {source}")]
    Spawn {
        label: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{label}: i/o error: {source}")]
    Io {
        label: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{label}: timed out after {after:?}")]
    Timeout { label: String, after: Duration },

    #[error("{label}: cancelled")]
    Cancelled { label: String },
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code; `None` when the child died to a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// First `n` lines of combined output, for event payloads.
    pub fn first_lines(&self, n: usize) -> String {
        self.stdout
            .lines()
            .chain(self.stderr.lines())
            .take(n)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Run to completion with a timeout and the default grace window.
pub async fn run_with_timeout(
    cmd: Command,
    timeout: Duration,
    label: &str,
) -> Result<CommandOutput, SubprocessError> {
    run_cancellable(cmd, timeout, DEFAULT_KILL_GRACE, &CancellationToken::new(), label).await
}

/// Run to completion, racing the timeout and the cancellation token.
///
/// On timeout or cancellation the child receives SIGTERM; if it has not
/// exited within `grace` it is SIGKILLed and reaped.
pub async fn run_cancellable(
    mut cmd: Command,
    timeout: Duration,
    grace: Duration,
    cancel: &CancellationToken,
    label: &str,
) -> Result<CommandOutput, SubprocessError> {
    cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|source| SubprocessError::Spawn { label: label.to_string(), source })?;
    let pid = child.id();

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let out_task = tokio::spawn(read_to_string(stdout));
    let err_task = tokio::spawn(read_to_string(stderr));

    enum Outcome {
        Exited(std::process::ExitStatus),
        TimedOut,
        Cancelled,
    }

    let outcome = tokio::select! {
        status = child.wait() => Outcome::Exited(
            status.map_err(|source| SubprocessError::Io { label: label.to_string(), source })?,
        ),
        _ = tokio::time::sleep(timeout) => Outcome::TimedOut,
        _ = cancel.cancelled() => Outcome::Cancelled,
    };

    match outcome {
        Outcome::Exited(status) => {
            let stdout = out_task.await.unwrap_or_default();
            let stderr = err_task.await.unwrap_or_default();
            Ok(CommandOutput { code: status.code(), stdout, stderr })
        }
        Outcome::TimedOut => {
            terminate(&mut child, pid, grace).await;
            Err(SubprocessError::Timeout { label: label.to_string(), after: timeout })
        }
        Outcome::Cancelled => {
            terminate(&mut child, pid, grace).await;
            Err(SubprocessError::Cancelled { label: label.to_string() })
        }
    }
}

/// SIGTERM, wait out the grace window, then SIGKILL and reap.
async fn terminate(child: &mut Child, pid: Option<u32>, grace: Duration) {
    if let Some(pid) = pid {
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }
    if tokio::time::timeout(grace, child.wait()).await.is_err() {
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

async fn read_to_string(stream: Option<impl tokio::io::AsyncRead + Unpin>) -> String {
    let Some(mut stream) = stream else { return String::new() };
    let mut buf = Vec::new();
    let _ = stream.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
