// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event record and taxonomy.
//!
//! Events are immutable once emitted. Constructors are builder-style and
//! consume/return the record, so observers always see a finished value.
//! Serializes with `{"type": "unit.started", ...fields}` format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every event type an observer may encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    // -- orchestrator --
    #[serde(rename = "orch.started")]
    OrchStarted,
    #[serde(rename = "orch.completed")]
    OrchCompleted,
    #[serde(rename = "orch.failed")]
    OrchFailed,

    // -- unit --
    #[serde(rename = "unit.queued")]
    UnitQueued,
    #[serde(rename = "unit.started")]
    UnitStarted,
    #[serde(rename = "unit.completed")]
    UnitCompleted,
    #[serde(rename = "unit.failed")]
    UnitFailed,
    #[serde(rename = "unit.blocked")]
    UnitBlocked,

    // -- task --
    #[serde(rename = "task.started")]
    TaskStarted,
    #[serde(rename = "task.claude.invoke")]
    TaskClaudeInvoke,
    #[serde(rename = "task.claude.done")]
    TaskClaudeDone,
    #[serde(rename = "task.backpressure")]
    TaskBackpressure,
    #[serde(rename = "task.validation.ok")]
    TaskValidationOk,
    #[serde(rename = "task.validation.fail")]
    TaskValidationFail,
    #[serde(rename = "task.committed")]
    TaskCommitted,
    #[serde(rename = "task.completed")]
    TaskCompleted,
    #[serde(rename = "task.retry")]
    TaskRetry,
    #[serde(rename = "task.failed")]
    TaskFailed,

    // -- code review --
    #[serde(rename = "codereview.started")]
    CodeReviewStarted,
    #[serde(rename = "codereview.passed")]
    CodeReviewPassed,
    #[serde(rename = "codereview.issues_found")]
    CodeReviewIssuesFound,
    #[serde(rename = "codereview.fix_attempt")]
    CodeReviewFixAttempt,
    #[serde(rename = "codereview.fix_applied")]
    CodeReviewFixApplied,
    #[serde(rename = "codereview.failed")]
    CodeReviewFailed,

    // -- pull request --
    #[serde(rename = "pr.created")]
    PrCreated,
    #[serde(rename = "pr.review.pending")]
    PrReviewPending,
    #[serde(rename = "pr.review.in_progress")]
    PrReviewInProgress,
    #[serde(rename = "pr.review.approved")]
    PrReviewApproved,
    #[serde(rename = "pr.feedback.received")]
    PrFeedbackReceived,
    #[serde(rename = "pr.feedback.addressed")]
    PrFeedbackAddressed,
    #[serde(rename = "pr.merge.queued")]
    PrMergeQueued,
    #[serde(rename = "pr.conflict")]
    PrConflict,
    #[serde(rename = "pr.merged")]
    PrMerged,
    #[serde(rename = "pr.failed")]
    PrFailed,

    // -- worktree / branch --
    #[serde(rename = "worktree.created")]
    WorktreeCreated,
    #[serde(rename = "worktree.removed")]
    WorktreeRemoved,
    #[serde(rename = "branch.pushed")]
    BranchPushed,
}

crate::simple_display! {
    EventKind {
        OrchStarted => "orch.started",
        OrchCompleted => "orch.completed",
        OrchFailed => "orch.failed",
        UnitQueued => "unit.queued",
        UnitStarted => "unit.started",
        UnitCompleted => "unit.completed",
        UnitFailed => "unit.failed",
        UnitBlocked => "unit.blocked",
        TaskStarted => "task.started",
        TaskClaudeInvoke => "task.claude.invoke",
        TaskClaudeDone => "task.claude.done",
        TaskBackpressure => "task.backpressure",
        TaskValidationOk => "task.validation.ok",
        TaskValidationFail => "task.validation.fail",
        TaskCommitted => "task.committed",
        TaskCompleted => "task.completed",
        TaskRetry => "task.retry",
        TaskFailed => "task.failed",
        CodeReviewStarted => "codereview.started",
        CodeReviewPassed => "codereview.passed",
        CodeReviewIssuesFound => "codereview.issues_found",
        CodeReviewFixAttempt => "codereview.fix_attempt",
        CodeReviewFixApplied => "codereview.fix_applied",
        CodeReviewFailed => "codereview.failed",
        PrCreated => "pr.created",
        PrReviewPending => "pr.review.pending",
        PrReviewInProgress => "pr.review.in_progress",
        PrReviewApproved => "pr.review.approved",
        PrFeedbackReceived => "pr.feedback.received",
        PrFeedbackAddressed => "pr.feedback.addressed",
        PrMergeQueued => "pr.merge.queued",
        PrConflict => "pr.conflict",
        PrMerged => "pr.merged",
        PrFailed => "pr.failed",
        WorktreeCreated => "worktree.created",
        WorktreeRemoved => "worktree.removed",
        BranchPushed => "branch.pushed",
    }
}

impl EventKind {
    /// True for events that change persisted run state (unit/task/pr
    /// status), as opposed to progress notifications.
    pub fn is_state_changing(&self) -> bool {
        matches!(
            self,
            EventKind::OrchStarted
                | EventKind::OrchCompleted
                | EventKind::OrchFailed
                | EventKind::UnitQueued
                | EventKind::UnitStarted
                | EventKind::UnitCompleted
                | EventKind::UnitFailed
                | EventKind::UnitBlocked
                | EventKind::TaskStarted
                | EventKind::TaskCompleted
                | EventKind::TaskFailed
                | EventKind::PrCreated
                | EventKind::PrMerged
                | EventKind::PrFailed
        )
    }
}

/// An immutable orchestration event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Wall-clock emission time (UTC); stamped by the bus on emit.
    pub time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr: Option<u64>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub payload: serde_json::Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            time: Utc::now(),
            unit: None,
            task: None,
            pr: None,
            payload: serde_json::Map::new(),
            error: None,
        }
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn task(mut self, task: u32) -> Self {
        self.task = Some(task);
        self
    }

    pub fn pr(mut self, pr: u64) -> Self {
        self.pr = Some(pr);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attach one structured payload field.
    pub fn payload_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Replace the time stamp (used by the bus on emit).
    pub fn stamped(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
