// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Code-generation provider abstraction.
//!
//! A provider takes a prompt and a working directory, runs to completion
//! mutating files in the workdir, and streams its output to the supplied
//! sinks. Cancellation is the caller's concern: dropping the `invoke`
//! future kills the child process.

use crate::subprocess::DEFAULT_KILL_GRACE;
use async_trait::async_trait;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

/// Name of a code-generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderType(String);

impl ProviderType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn claude() -> Self {
        Self("claude".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Categorized provider failures.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider configuration: {0}")]
    Config(String),

    #[error("provider invocation failed: {0}")]
    Invocation(String),

    #[error("provider timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider cancelled")]
    Cancelled,
}

/// Receives provider output one line at a time.
pub trait OutputSink: Send + Sync {
    fn line(&self, line: &str);
}

impl<F> OutputSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn line(&self, line: &str) {
        self(line)
    }
}

/// Abstract code-generation backend.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> ProviderType;

    /// Run the provider over `workdir` until it finishes or fails.
    async fn invoke(
        &self,
        prompt: &str,
        workdir: &Path,
        stdout: &dyn OutputSink,
        stderr: &dyn OutputSink,
    ) -> Result<(), ProviderError>;
}

/// Provider that shells out to an agent CLI, feeding the prompt on stdin.
pub struct CommandProvider {
    name: ProviderType,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandProvider {
    pub fn new(name: ProviderType, program: impl Into<String>, timeout: Duration) -> Self {
        Self { name, program: program.into(), args: Vec::new(), timeout }
    }

    /// The stock claude invocation: `claude -p` reading the prompt from stdin.
    pub fn claude(timeout: Duration) -> Self {
        Self {
            name: ProviderType::claude(),
            program: "claude".to_string(),
            args: vec!["-p".to_string()],
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

#[async_trait]
impl Provider for CommandProvider {
    fn name(&self) -> ProviderType {
        self.name.clone()
    }

    async fn invoke(
        &self,
        prompt: &str,
        workdir: &Path,
        stdout: &dyn OutputSink,
        stderr: &dyn OutputSink,
    ) -> Result<(), ProviderError> {
        if self.program.is_empty() {
            return Err(ProviderError::Config("provider command is empty".to_string()));
        }
        if !workdir.is_dir() {
            return Err(ProviderError::Config(format!(
                "workdir {} is not a directory",
                workdir.display()
            )));
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| ProviderError::Invocation(format!("spawn {}: {e}", self.program)))?;
        let pid = child.id();

        // Feed the prompt concurrently with output streaming so a large
        // prompt cannot deadlock against a full stdout pipe. Dropping
        // stdin closes it, telling the CLI the prompt is complete.
        let stdin = child.stdin.take();
        let prompt_owned = prompt.to_string();
        tokio::spawn(async move {
            if let Some(mut stdin) = stdin {
                if let Err(e) = stdin.write_all(prompt_owned.as_bytes()).await {
                    tracing::debug!(error = %e, "provider stdin write failed");
                }
            }
        });

        let out_reader = child.stdout.take();
        let err_reader = child.stderr.take();
        let mut err_tail: Vec<String> = Vec::new();

        let stream = async {
            if let Some(out) = out_reader {
                let mut lines = BufReader::new(out).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    stdout.line(&line);
                }
            }
        };
        let stream_err = async {
            let mut tail = Vec::new();
            if let Some(err) = err_reader {
                let mut lines = BufReader::new(err).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    stderr.line(&line);
                    if tail.len() >= 10 {
                        tail.remove(0);
                    }
                    tail.push(line);
                }
            }
            tail
        };

        let run = async {
            let (_, tail) = tokio::join!(stream, stream_err);
            let status = child.wait().await;
            (status, tail)
        };

        // Bind before matching so the timed-out future (and its borrow of
        // the child) is dropped before the kill path touches the child.
        let timed = tokio::time::timeout(self.timeout, run).await;
        let (status, tail) = match timed {
            Ok((status, tail)) => (status, tail),
            Err(_) => {
                if let Some(pid) = pid {
                    let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
                }
                if tokio::time::timeout(DEFAULT_KILL_GRACE, child.wait()).await.is_err() {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                }
                return Err(ProviderError::Timeout(self.timeout));
            }
        };
        err_tail.extend(tail);

        let status =
            status.map_err(|e| ProviderError::Invocation(format!("wait {}: {e}", self.program)))?;
        if !status.success() {
            return Err(ProviderError::Invocation(format!(
                "{} exited with {status}: {}",
                self.program,
                err_tail.join("\n")
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
