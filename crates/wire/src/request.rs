// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Requests from CLI to daemon.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One request frame: `{"id": 1, "method": "...", "params": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    #[serde(flatten)]
    pub method: Method,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum Method {
    /// Health check
    Health,

    /// Start a new orchestration job
    StartJob(StartJobParams),

    /// List known jobs
    ListJobs(ListJobsParams),

    /// Stream a job's events from a sequence number
    WatchJob(WatchJobParams),

    /// Stop a running job
    StopJob(StopJobParams),

    /// Shut the daemon down
    Shutdown(ShutdownParams),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartJobParams {
    pub tasks_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_branch: Option<String>,
    #[serde(default)]
    pub skip_review: bool,
    #[serde(default)]
    pub no_pr: bool,
    /// Restrict the run to one unit (plus its dependencies).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ListJobsParams {
    /// Keep only jobs whose status matches one of these.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchJobParams {
    pub job_id: String,
    /// 0 = from job start.
    #[serde(default)]
    pub from_seq: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopJobParams {
    pub job_id: String,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShutdownParams {
    #[serde(default)]
    pub wait_for_jobs: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_sec: Option<u64>,
}
