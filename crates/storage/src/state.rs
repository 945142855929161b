// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized run state built by applying events.

use chrono::{DateTime, Utc};
use choo_core::{Event, EventKind, TaskStatus, UnitStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    pub number: u32,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Snapshot of one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitState {
    pub status: UnitStatus,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tasks: BTreeMap<u32, TaskState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for UnitState {
    fn default() -> Self {
        Self {
            status: UnitStatus::Pending,
            tasks: BTreeMap::new(),
            pr_number: None,
            started_at: None,
            completed_at: None,
            error: None,
        }
    }
}

/// Run status as seen by observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

/// Compact run state materialized from the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RunState {
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub units: BTreeMap<String, UnitState>,
    #[serde(default)]
    pub events_applied: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RunState {
    /// Apply one event. Returns true when the event changed state worth
    /// persisting (the snapshot handler keys on this). Task status never
    /// regresses: a completed task stays completed.
    pub fn apply(&mut self, event: &Event) -> bool {
        self.events_applied += 1;
        self.updated_at = Some(event.time);

        let changed = match event.kind {
            EventKind::OrchStarted => {
                self.status = RunStatus::Running;
                true
            }
            EventKind::OrchCompleted => {
                self.status = RunStatus::Completed;
                true
            }
            EventKind::OrchFailed => {
                self.status = RunStatus::Failed;
                true
            }

            EventKind::UnitQueued => self.with_unit(event, |unit| {
                unit.status = UnitStatus::Pending;
            }),
            EventKind::UnitStarted => self.with_unit(event, |unit| {
                unit.status = UnitStatus::InProgress;
                unit.started_at = Some(event.time);
            }),
            EventKind::UnitCompleted => self.with_unit(event, |unit| {
                unit.status = UnitStatus::Complete;
                unit.completed_at = Some(event.time);
            }),
            EventKind::UnitFailed => {
                let error = event.error.clone();
                self.with_unit(event, |unit| {
                    unit.status = UnitStatus::Failed;
                    unit.completed_at = Some(event.time);
                    unit.error = error;
                })
            }
            EventKind::UnitBlocked => self.with_unit(event, |unit| {
                unit.status = UnitStatus::Blocked;
            }),

            EventKind::TaskStarted => self.with_task(event, |task| {
                task.status = TaskStatus::InProgress;
            }),
            EventKind::TaskCompleted => self.with_task(event, |task| {
                task.status = TaskStatus::Complete;
            }),
            EventKind::TaskFailed => {
                let error = event.error.clone();
                self.with_task(event, |task| {
                    task.status = TaskStatus::Failed;
                    task.error = error;
                })
            }

            EventKind::PrCreated | EventKind::PrMerged => {
                let pr = event.pr;
                self.with_unit(event, |unit| {
                    if unit.pr_number.is_none() {
                        unit.pr_number = pr;
                    }
                })
            }

            // Progress notifications; observers render them live but the
            // persisted snapshot does not change.
            _ => false,
        };
        changed
    }

    /// Counts for the summary line: (complete, failed, blocked, total).
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        let mut complete = 0;
        let mut failed = 0;
        let mut blocked = 0;
        for unit in self.units.values() {
            match unit.status {
                UnitStatus::Complete => complete += 1,
                UnitStatus::Failed => failed += 1,
                UnitStatus::Blocked => blocked += 1,
                _ => {}
            }
        }
        (complete, failed, blocked, self.units.len())
    }

    fn with_unit(&mut self, event: &Event, apply: impl FnOnce(&mut UnitState)) -> bool {
        let Some(id) = event.unit.as_deref() else { return false };
        let unit = self.units.entry(id.to_string()).or_default();
        apply(unit);
        true
    }

    fn with_task(&mut self, event: &Event, apply: impl FnOnce(&mut TaskState)) -> bool {
        let Some(id) = event.unit.as_deref() else { return false };
        let Some(number) = event.task else { return false };
        let unit = self.units.entry(id.to_string()).or_default();
        let task = unit
            .tasks
            .entry(number)
            .or_insert(TaskState { number, status: TaskStatus::Pending, error: None });
        // Monotone task progress: complete never regresses.
        if task.status == TaskStatus::Complete {
            return false;
        }
        apply(task);
        true
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
