// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hosted PR API ("forge") abstraction.

use crate::subprocess::{run_with_timeout, SubprocessError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

const FORGE_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ForgeError {
    /// Transient failure (network, rate limit); callers retry with backoff.
    #[error("forge unavailable: {0}")]
    Unavailable(String),

    /// The merge cannot proceed because the branch conflicts with the base.
    #[error("merge conflict on PR #{0}")]
    Conflict(u64),

    #[error("PR #{0} not found")]
    NotFound(u64),

    #[error("forge API error: {0}")]
    Api(String),

    #[error(transparent)]
    Subprocess(#[from] SubprocessError),
}

impl ForgeError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ForgeError::Unavailable(_) | ForgeError::Subprocess(_))
    }
}

/// Review state observed while polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ReviewState {
    Pending,
    InProgress,
    Approved,
    ChangesRequested {
        /// Aggregated reviewer feedback, fed back into the task loop.
        feedback: String,
    },
}

/// Parameters for opening a PR.
#[derive(Debug, Clone, PartialEq)]
pub struct PrRequest {
    pub title: String,
    pub body: String,
    /// Head branch (the unit branch).
    pub head: String,
    /// Base branch (the target branch).
    pub base: String,
}

/// Operations the orchestrator requires from the hosted PR API.
#[async_trait]
pub trait Forge: Send + Sync {
    /// Open a PR; returns the PR number.
    async fn open_pr(&self, repo: &Path, request: &PrRequest) -> Result<u64, ForgeError>;

    async fn review_state(&self, repo: &Path, pr: u64) -> Result<ReviewState, ForgeError>;

    /// Merge the PR. `ForgeError::Conflict` signals a rebase is needed.
    async fn merge_pr(&self, repo: &Path, pr: u64) -> Result<(), ForgeError>;
}

/// Forge implementation shelling out to the `gh` CLI.
#[derive(Debug, Clone, Default)]
pub struct GhForge;

impl GhForge {
    pub fn new() -> Self {
        Self
    }

    async fn run(&self, repo: &Path, args: &[&str], op: &str) -> Result<String, ForgeError> {
        let mut cmd = Command::new("gh");
        cmd.args(args).current_dir(repo);
        let out = run_with_timeout(cmd, FORGE_COMMAND_TIMEOUT, op).await?;
        if !out.success() {
            let stderr = out.stderr.trim().to_string();
            // Network-ish failures are worth retrying; API rejections are not.
            let lowered = stderr.to_lowercase();
            if lowered.contains("timeout")
                || lowered.contains("connection")
                || lowered.contains("rate limit")
            {
                return Err(ForgeError::Unavailable(stderr));
            }
            return Err(ForgeError::Api(format!("{op}: {stderr}")));
        }
        Ok(out.stdout)
    }
}

#[async_trait]
impl Forge for GhForge {
    async fn open_pr(&self, repo: &Path, request: &PrRequest) -> Result<u64, ForgeError> {
        let out = self
            .run(
                repo,
                &[
                    "pr",
                    "create",
                    "--title",
                    &request.title,
                    "--body",
                    &request.body,
                    "--head",
                    &request.head,
                    "--base",
                    &request.base,
                ],
                "pr create",
            )
            .await?;

        // `gh pr create` prints the PR URL; the number is the last path segment.
        let url = out.trim().lines().last().unwrap_or_default();
        url.rsplit('/')
            .next()
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| ForgeError::Api(format!("cannot parse PR number from {url:?}")))
    }

    async fn review_state(&self, repo: &Path, pr: u64) -> Result<ReviewState, ForgeError> {
        let pr_arg = pr.to_string();
        let out = self
            .run(
                repo,
                &["pr", "view", &pr_arg, "--json", "reviewDecision,reviews"],
                "pr view",
            )
            .await?;

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct View {
            #[serde(default)]
            review_decision: Option<String>,
            #[serde(default)]
            reviews: Vec<Review>,
        }
        #[derive(Deserialize)]
        struct Review {
            #[serde(default)]
            body: String,
        }

        let view: View =
            serde_json::from_str(&out).map_err(|e| ForgeError::Api(format!("pr view: {e}")))?;

        Ok(match view.review_decision.as_deref() {
            Some("APPROVED") => ReviewState::Approved,
            Some("CHANGES_REQUESTED") => ReviewState::ChangesRequested {
                feedback: view
                    .reviews
                    .iter()
                    .map(|r| r.body.as_str())
                    .filter(|b| !b.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n"),
            },
            Some("REVIEW_REQUIRED") if !view.reviews.is_empty() => ReviewState::InProgress,
            _ => ReviewState::Pending,
        })
    }

    async fn merge_pr(&self, repo: &Path, pr: u64) -> Result<(), ForgeError> {
        let pr_arg = pr.to_string();
        match self.run(repo, &["pr", "merge", &pr_arg, "--squash"], "pr merge").await {
            Ok(_) => Ok(()),
            Err(ForgeError::Api(detail)) if detail.to_lowercase().contains("conflict") => {
                Err(ForgeError::Conflict(pr))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "forge_tests.rs"]
mod tests;
