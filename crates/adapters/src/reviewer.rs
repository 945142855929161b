// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advisory code reviewer abstraction.
//!
//! Reviewers look at a worktree's diff against a base ref and return
//! structured issues. Review outcomes never block a merge; the engine
//! treats every reviewer failure as advisory.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReviewerError {
    #[error("reviewer unavailable: {0}")]
    Unavailable(String),

    #[error("review failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

choo_core::simple_display! {
    Severity {
        Info => "info",
        Warning => "warning",
        Error => "error",
    }
}

/// One structured review finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewIssue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Outcome of one review pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewResult {
    pub passed: bool,
    pub summary: String,
    #[serde(default)]
    pub issues: Vec<ReviewIssue>,
}

impl ReviewResult {
    pub fn clean(summary: impl Into<String>) -> Self {
        Self { passed: true, summary: summary.into(), issues: Vec::new() }
    }
}

/// Abstract advisory reviewer.
#[async_trait]
pub trait Reviewer: Send + Sync {
    /// Review the diff of `workdir` against `base_ref`.
    async fn review(&self, workdir: &Path, base_ref: &str) -> Result<ReviewResult, ReviewerError>;
}

/// Reviewer used when none is configured: every diff passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassiveReviewer;

#[async_trait]
impl Reviewer for PassiveReviewer {
    async fn review(&self, _workdir: &Path, _base_ref: &str) -> Result<ReviewResult, ReviewerError> {
        Ok(ReviewResult::clean("no reviewer configured"))
    }
}
