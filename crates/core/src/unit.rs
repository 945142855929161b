// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unit and task model.
//!
//! A unit is a directory-encoded workflow of dependent tasks; the unit of
//! parallelism for the orchestrator. Units are created by discovery and
//! mutated only by the worker that owns them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Lifecycle status of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Pending,
    InProgress,
    Complete,
    Failed,
    /// A transitive dependency failed; distinct from `Failed`.
    Blocked,
}

crate::simple_display! {
    UnitStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Complete => "complete",
        Failed => "failed",
        Blocked => "blocked",
    }
}

impl UnitStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UnitStatus::Complete | UnitStatus::Failed | UnitStatus::Blocked)
    }
}

impl std::str::FromStr for UnitStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(UnitStatus::Pending),
            "in_progress" => Ok(UnitStatus::InProgress),
            "complete" => Ok(UnitStatus::Complete),
            "failed" => Ok(UnitStatus::Failed),
            "blocked" => Ok(UnitStatus::Blocked),
            other => Err(format!("unknown unit status: {other:?}")),
        }
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Complete,
    Failed,
}

crate::simple_display! {
    TaskStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Complete => "complete",
        Failed => "failed",
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "complete" => Ok(TaskStatus::Complete),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("unknown task status: {other:?}")),
        }
    }
}

/// One markdown task file inside a unit directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Integer taken from the two-digit filename prefix.
    pub number: u32,
    /// First `#` heading of the file body.
    pub title: String,
    pub status: TaskStatus,
    /// Shell command whose exit code gates acceptance of this task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backpressure: Option<String>,
    /// Task numbers within the same unit that must complete first.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub depends_on: BTreeSet<u32>,
    /// Path relative to the unit directory.
    pub file_path: PathBuf,
    /// Full markdown body below the front matter (the task spec).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
}

/// A directory-encoded workflow of dependent tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    /// Directory basename; unique within a run.
    pub id: String,
    pub path: PathBuf,
    /// Ids of other units that must complete first. Acyclic across the run.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub depends_on: BTreeSet<String>,
    pub status: UnitStatus,
    /// Ordered by task number.
    pub tasks: Vec<Task>,
    /// Optional override naming the code-generation backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Unit {
    /// Unit status derived from task statuses: complete when all tasks
    /// are complete, in_progress when any started or some-but-not-all
    /// complete, pending otherwise.
    pub fn derived_status(tasks: &[Task]) -> UnitStatus {
        if !tasks.is_empty() && tasks.iter().all(|t| t.status == TaskStatus::Complete) {
            return UnitStatus::Complete;
        }
        let any_moving = tasks
            .iter()
            .any(|t| matches!(t.status, TaskStatus::InProgress | TaskStatus::Complete));
        if any_moving {
            UnitStatus::InProgress
        } else {
            UnitStatus::Pending
        }
    }

    pub fn task(&self, number: u32) -> Option<&Task> {
        self.tasks.iter().find(|t| t.number == number)
    }

    pub fn task_mut(&mut self, number: u32) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.number == number)
    }

    /// Lowest-numbered pending task whose intra-unit deps are complete.
    pub fn next_ready_task(&self) -> Option<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .find(|t| {
                t.depends_on.iter().all(|dep| {
                    self.task(*dep).map(|d| d.status == TaskStatus::Complete).unwrap_or(false)
                })
            })
    }

    /// True when every task reached a terminal status.
    pub fn all_tasks_complete(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.iter().all(|t| t.status == TaskStatus::Complete)
    }
}

#[cfg(test)]
#[path = "unit_tests.rs"]
mod tests;
