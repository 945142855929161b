// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency-aware unit scheduler.
//!
//! The scheduler owns the {pending, running, complete, failed, blocked}
//! sets. `dispatch` is non-blocking and deterministic; capacity is the
//! worker pool's concern, so the pool only asks for a dispatch while it
//! has a free slot. Failure propagates `blocked` to every transitive
//! dependent.

use crate::graph::UnitGraph;
use choo_core::{Unit, UnitStatus};
use std::collections::BTreeSet;

/// Outcome of one dispatch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Run this unit next.
    Unit(String),
    /// Nothing ready right now; running units will unblock more.
    NoneReady,
    /// Every unit is complete.
    AllComplete,
    /// All remaining units are terminal and at least one is failed/blocked.
    AllBlocked,
}

/// Terminal counts for a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct SchedulerSummary {
    pub total: usize,
    pub complete: usize,
    pub failed: usize,
    pub blocked: usize,
}

#[derive(Debug)]
pub struct Scheduler {
    graph: UnitGraph,
    pending: BTreeSet<String>,
    running: BTreeSet<String>,
    complete: BTreeSet<String>,
    failed: BTreeSet<String>,
    blocked: BTreeSet<String>,
    /// Drain mode: stop yielding new units (set on cancellation).
    draining: bool,
}

impl Scheduler {
    /// Build from discovered units. Units already complete on disk seed
    /// the complete set so dependents can run immediately.
    pub fn new(graph: UnitGraph, units: &[Unit]) -> Self {
        let mut pending = BTreeSet::new();
        let mut complete = BTreeSet::new();
        for unit in units {
            if unit.status == UnitStatus::Complete {
                complete.insert(unit.id.clone());
            } else {
                pending.insert(unit.id.clone());
            }
        }
        Self {
            graph,
            pending,
            running: BTreeSet::new(),
            complete,
            failed: BTreeSet::new(),
            blocked: BTreeSet::new(),
            draining: false,
        }
    }

    pub fn graph(&self) -> &UnitGraph {
        &self.graph
    }

    /// Pick the next ready unit: deps complete, not running, not
    /// terminal. Tie-break by (level, id) for determinism.
    pub fn dispatch(&mut self) -> Dispatch {
        if self.pending.is_empty() && self.running.is_empty() {
            return if self.failed.is_empty() && self.blocked.is_empty() {
                Dispatch::AllComplete
            } else {
                Dispatch::AllBlocked
            };
        }
        if self.draining {
            return Dispatch::NoneReady;
        }

        let mut ready: Vec<&String> = self
            .pending
            .iter()
            .filter(|id| {
                self.graph.dependencies(id).all(|dep| self.complete.contains(dep))
            })
            .collect();
        ready.sort_by_key(|id| (self.graph.level(id), id.as_str()));

        match ready.first() {
            Some(id) => {
                let id = (*id).clone();
                self.pending.remove(&id);
                self.running.insert(id.clone());
                Dispatch::Unit(id)
            }
            None => Dispatch::NoneReady,
        }
    }

    /// Mark a unit complete; called by the pool on worker success.
    pub fn complete(&mut self, id: &str) {
        self.running.remove(id);
        self.pending.remove(id);
        self.complete.insert(id.to_string());
    }

    /// Mark a unit failed and propagate `blocked` to its transitive
    /// dependents. Returns the newly blocked ids (sorted).
    pub fn fail(&mut self, id: &str) -> Vec<String> {
        self.running.remove(id);
        self.pending.remove(id);
        self.failed.insert(id.to_string());

        let mut newly_blocked = Vec::new();
        for desc in self.graph.descendants(id) {
            if self.pending.remove(&desc) {
                self.blocked.insert(desc.clone());
                newly_blocked.push(desc);
            }
        }
        newly_blocked
    }

    /// Stop yielding new units; running workers finish their current
    /// task boundary and exit.
    pub fn drain(&mut self) {
        self.draining = true;
    }

    pub fn is_draining(&self) -> bool {
        self.draining
    }

    /// All units terminal (complete, failed, or blocked).
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty() && self.running.is_empty()
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn status_of(&self, id: &str) -> Option<UnitStatus> {
        if self.complete.contains(id) {
            Some(UnitStatus::Complete)
        } else if self.failed.contains(id) {
            Some(UnitStatus::Failed)
        } else if self.blocked.contains(id) {
            Some(UnitStatus::Blocked)
        } else if self.running.contains(id) {
            Some(UnitStatus::InProgress)
        } else if self.pending.contains(id) {
            Some(UnitStatus::Pending)
        } else {
            None
        }
    }

    pub fn summary(&self) -> SchedulerSummary {
        SchedulerSummary {
            total: self.graph.ids().len(),
            complete: self.complete.len(),
            failed: self.failed.len(),
            blocked: self.blocked.len(),
        }
    }

    /// Pending units abandoned by a drain (for reporting).
    pub fn abandoned(&self) -> Vec<String> {
        self.pending.iter().cloned().collect()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
