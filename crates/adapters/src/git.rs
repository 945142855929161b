// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local VCS operations.
//!
//! The engine never runs `git` directly; it goes through this trait so
//! worktree and branch plumbing can be faked in tests. `SystemGit`
//! shells out to the `git` binary with `GIT_DIR`/`GIT_WORK_TREE`
//! scrubbed from the environment so worktree-local invocations resolve
//! their own repository.

use crate::subprocess::{run_with_timeout, SubprocessError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Ceiling for a single git invocation.
pub const GIT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("git {op} failed: {detail}")]
    Command { op: String, detail: String },

    #[error("worktree {path} has uncommitted changes")]
    Dirty { path: PathBuf },

    #[error(transparent)]
    Subprocess(#[from] SubprocessError),
}

/// A registered worktree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeInfo {
    pub path: PathBuf,
    pub branch: Option<String>,
}

/// Operations the orchestrator requires from the local VCS.
#[async_trait]
pub trait Git: Send + Sync {
    /// `git worktree add -b <branch> <path> <start_point>`.
    async fn worktree_add(
        &self,
        repo_root: &Path,
        path: &Path,
        branch: &str,
        start_point: &str,
    ) -> Result<(), VcsError>;

    /// `git worktree remove [--force] <path>`, then delete the branch.
    async fn worktree_remove(&self, path: &Path, force: bool) -> Result<(), VcsError>;

    async fn worktree_list(&self, repo_root: &Path) -> Result<Vec<WorktreeInfo>, VcsError>;

    /// Paths reported by `git status --porcelain`.
    async fn changed_files(&self, path: &Path) -> Result<Vec<String>, VcsError>;

    async fn has_uncommitted_changes(&self, path: &Path) -> Result<bool, VcsError> {
        Ok(!self.changed_files(path).await?.is_empty())
    }

    /// `git add -A`.
    async fn stage_all(&self, path: &Path) -> Result<(), VcsError>;

    /// `git commit -m <message>`; `no_verify` adds `--no-verify`.
    async fn commit(&self, path: &Path, message: &str, no_verify: bool) -> Result<(), VcsError>;

    /// `git push -u origin <branch>`, creating the remote branch if missing.
    async fn push(&self, path: &Path, branch: &str) -> Result<(), VcsError>;

    /// `git fetch origin <branch>` followed by `git rebase origin/<branch>`.
    async fn rebase_onto(&self, path: &Path, target_branch: &str) -> Result<(), VcsError>;

    /// Best-effort worktree clean: `reset HEAD`, `clean -fd`, `checkout .`.
    async fn clean_worktree(&self, path: &Path);
}

/// `git` CLI implementation.
#[derive(Debug, Clone)]
pub struct SystemGit {
    timeout: Duration,
}

impl SystemGit {
    pub fn new() -> Self {
        Self { timeout: GIT_COMMAND_TIMEOUT }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn command(cwd: &Path, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(cwd)
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE");
        cmd
    }

    async fn run(&self, cwd: &Path, args: &[&str], op: &str) -> Result<String, VcsError> {
        let out = run_with_timeout(Self::command(cwd, args), self.timeout, op).await?;
        if !out.success() {
            return Err(VcsError::Command {
                op: op.to_string(),
                detail: out.stderr.trim().to_string(),
            });
        }
        Ok(out.stdout)
    }
}

impl Default for SystemGit {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Git for SystemGit {
    async fn worktree_add(
        &self,
        repo_root: &Path,
        path: &Path,
        branch: &str,
        start_point: &str,
    ) -> Result<(), VcsError> {
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return Err(VcsError::Command {
                    op: "worktree add".to_string(),
                    detail: format!("create parent dir: {e}"),
                });
            }
        }
        let path_str = path.display().to_string();
        self.run(
            repo_root,
            &["worktree", "add", "-b", branch, &path_str, start_point],
            "worktree add",
        )
        .await?;
        Ok(())
    }

    async fn worktree_remove(&self, path: &Path, force: bool) -> Result<(), VcsError> {
        let path_str = path.display().to_string();
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(&path_str);
        // Run from within the worktree so git can locate the parent repo.
        self.run(path, &args, "worktree remove").await?;
        Ok(())
    }

    async fn worktree_list(&self, repo_root: &Path) -> Result<Vec<WorktreeInfo>, VcsError> {
        let out = self.run(repo_root, &["worktree", "list", "--porcelain"], "worktree list").await?;
        Ok(parse_worktree_list(&out))
    }

    async fn changed_files(&self, path: &Path) -> Result<Vec<String>, VcsError> {
        let out = self.run(path, &["status", "--porcelain"], "status").await?;
        Ok(out
            .lines()
            .filter(|l| l.len() > 3)
            .map(|l| l[3..].trim().to_string())
            .collect())
    }

    async fn stage_all(&self, path: &Path) -> Result<(), VcsError> {
        self.run(path, &["add", "-A"], "add").await?;
        Ok(())
    }

    async fn commit(&self, path: &Path, message: &str, no_verify: bool) -> Result<(), VcsError> {
        let mut args = vec!["commit", "-m", message];
        if no_verify {
            args.push("--no-verify");
        }
        self.run(path, &args, "commit").await?;
        Ok(())
    }

    async fn push(&self, path: &Path, branch: &str) -> Result<(), VcsError> {
        self.run(path, &["push", "-u", "origin", branch], "push").await?;
        Ok(())
    }

    async fn rebase_onto(&self, path: &Path, target_branch: &str) -> Result<(), VcsError> {
        self.run(path, &["fetch", "origin", target_branch], "fetch").await?;
        let upstream = format!("origin/{target_branch}");
        if let Err(e) = self.run(path, &["rebase", &upstream], "rebase").await {
            // Leave the tree usable for inspection.
            let _ = self.run(path, &["rebase", "--abort"], "rebase abort").await;
            return Err(e);
        }
        Ok(())
    }

    async fn clean_worktree(&self, path: &Path) {
        for (args, op) in [
            (&["reset", "HEAD"][..], "reset"),
            (&["clean", "-fd"][..], "clean"),
            (&["checkout", "."][..], "checkout"),
        ] {
            if let Err(e) = self.run(path, args, op).await {
                tracing::warn!(path = %path.display(), error = %e, "worktree clean step failed");
            }
        }
    }
}

fn parse_worktree_list(porcelain: &str) -> Vec<WorktreeInfo> {
    let mut worktrees = Vec::new();
    let mut current: Option<WorktreeInfo> = None;
    for line in porcelain.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            if let Some(done) = current.take() {
                worktrees.push(done);
            }
            current = Some(WorktreeInfo { path: PathBuf::from(path), branch: None });
        } else if let Some(branch) = line.strip_prefix("branch ") {
            if let Some(wt) = current.as_mut() {
                wt.branch = Some(branch.trim_start_matches("refs/heads/").to_string());
            }
        }
    }
    if let Some(done) = current {
        worktrees.push(done);
    }
    worktrees
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
