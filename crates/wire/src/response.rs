// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Responses from daemon to CLI.

use chrono::{DateTime, Utc};
use choo_core::{Event, JobId};
use serde::{Deserialize, Serialize};

/// One response frame. `WatchJob` produces a stream of frames sharing
/// the request id, terminated by `WatchEnd` (or the connection closing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    #[serde(flatten)]
    pub body: ResponseBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResponseBody {
    /// Health check response
    Health { healthy: bool, active_jobs: usize, version: String },

    /// Job accepted
    JobStarted { job_id: JobId },

    /// Known jobs
    Jobs { jobs: Vec<JobEntry> },

    /// One streamed job event
    WatchEvent { seq: u64, event: Event },

    /// The watched job reached a terminal state
    WatchEnd { last_seq: u64 },

    /// Generic acknowledgement
    Ok { ok: bool },

    /// Request failed
    Error { message: String },
}

/// Daemon-side job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    Stopped,
}

choo_core::simple_display! {
    JobStatus {
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Stopped => "stopped",
    }
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// One row of `ListJobs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEntry {
    pub job_id: JobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_branch: Option<String>,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub units_complete: usize,
    pub units_total: usize,
}
