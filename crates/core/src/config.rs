// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Immutable per-run configuration.
//!
//! Loaded once per run and passed explicitly into every component. The
//! daemon builds one of these per job, which is what keeps jobs isolated
//! from each other.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for one orchestrator run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory containing unit subdirectories.
    pub tasks_dir: PathBuf,
    /// Root of the repository worktrees are created from.
    pub repo_root: PathBuf,
    /// Branch that unit branches start from and merge into.
    pub target_branch: String,
    /// Shared integration branch name, when running under one.
    pub feature_branch: Option<String>,
    /// Worker pool bound.
    pub parallelism: usize,
    /// Per-task validation retry bound.
    pub max_retries: u32,
    /// Code-review fix iteration bound. Zero disables fixes.
    pub max_fix_iterations: u32,
    /// Bounded re-entries into the task loop on PR change requests.
    pub max_feedback_rounds: u32,
    /// Forge polling cadence while awaiting review.
    pub review_poll_interval: Duration,
    /// Total ceiling for awaiting review.
    pub review_timeout: Duration,
    /// Wall-clock ceiling for one provider invocation.
    pub provider_timeout: Duration,
    /// SIGTERM-to-SIGKILL grace window for shell children.
    pub kill_grace: Duration,
    /// Skip forge review polling; merge immediately after PR creation.
    pub skip_review: bool,
    /// Skip the PR lifecycle entirely; commits stay local.
    pub no_pr: bool,
    /// Default code-generation backend; units may override.
    pub provider: Option<String>,
    /// Prefix for unit branches (`ralph/<unit-id>`).
    pub branch_prefix: String,
    /// Directory under which worktrees are created.
    pub worktree_base: PathBuf,
    /// Restrict the run to a single unit id.
    pub only_unit: Option<String>,
}

impl RunConfig {
    pub fn builder(tasks_dir: impl Into<PathBuf>) -> RunConfigBuilder {
        RunConfigBuilder::new(tasks_dir)
    }

    /// Branch name for a unit worktree.
    pub fn unit_branch(&self, unit_id: &str) -> String {
        format!("{}{}", self.branch_prefix, unit_id)
    }
}

/// Builder for [`RunConfig`] with the documented defaults.
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    pub fn new(tasks_dir: impl Into<PathBuf>) -> Self {
        Self {
            config: RunConfig {
                tasks_dir: tasks_dir.into(),
                repo_root: PathBuf::from("."),
                target_branch: "main".to_string(),
                feature_branch: None,
                parallelism: 4,
                max_retries: 3,
                max_fix_iterations: 3,
                max_feedback_rounds: 3,
                review_poll_interval: Duration::from_secs(30),
                review_timeout: Duration::from_secs(60 * 60),
                provider_timeout: Duration::from_secs(30 * 60),
                kill_grace: Duration::from_secs(5),
                skip_review: false,
                no_pr: false,
                provider: None,
                branch_prefix: "ralph/".to_string(),
                worktree_base: PathBuf::from(".choo/worktrees"),
                only_unit: None,
            },
        }
    }

    pub fn repo_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.repo_root = root.into();
        self
    }

    pub fn target_branch(mut self, branch: impl Into<String>) -> Self {
        self.config.target_branch = branch.into();
        self
    }

    pub fn feature_branch(mut self, branch: impl Into<String>) -> Self {
        self.config.feature_branch = Some(branch.into());
        self
    }

    pub fn parallelism(mut self, parallelism: usize) -> Self {
        self.config.parallelism = parallelism.max(1);
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn max_fix_iterations(mut self, iterations: u32) -> Self {
        self.config.max_fix_iterations = iterations;
        self
    }

    pub fn max_feedback_rounds(mut self, rounds: u32) -> Self {
        self.config.max_feedback_rounds = rounds;
        self
    }

    pub fn review_poll_interval(mut self, interval: Duration) -> Self {
        self.config.review_poll_interval = interval;
        self
    }

    pub fn review_timeout(mut self, timeout: Duration) -> Self {
        self.config.review_timeout = timeout;
        self
    }

    pub fn provider_timeout(mut self, timeout: Duration) -> Self {
        self.config.provider_timeout = timeout;
        self
    }

    pub fn kill_grace(mut self, grace: Duration) -> Self {
        self.config.kill_grace = grace;
        self
    }

    pub fn skip_review(mut self, skip: bool) -> Self {
        self.config.skip_review = skip;
        self
    }

    pub fn no_pr(mut self, no_pr: bool) -> Self {
        self.config.no_pr = no_pr;
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.config.provider = Some(provider.into());
        self
    }

    pub fn branch_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.branch_prefix = prefix.into();
        self
    }

    pub fn worktree_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.config.worktree_base = base.into();
        self
    }

    pub fn only_unit(mut self, unit: impl Into<String>) -> Self {
        self.config.only_unit = Some(unit.into());
        self
    }

    pub fn build(self) -> RunConfig {
        self.config
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
