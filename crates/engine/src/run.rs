// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run orchestrator: discovery → scheduler → worker pool.
//!
//! One `Orchestrator` drives one run to completion. Unit failures never
//! abort the run; independent units keep going, and the run reports
//! `orch.failed` iff any unit ended failed or blocked.

use crate::graph::{GraphError, UnitGraph};
use crate::pool::WorkerPool;
use crate::scheduler::{Dispatch, Scheduler};
use crate::worker::{Worker, WorkerCtx, WorkerOutcome};
use crate::worktree::WorktreeManager;
use choo_adapters::{Forge, Git, Provider, Reviewer};
use choo_core::{Event, EventBus, EventKind, RunConfig, Unit, UnitStatus};
use choo_discovery::{discover, DiscoveryError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// External collaborators for one run.
#[derive(Clone)]
pub struct EngineDeps {
    pub provider: Arc<dyn Provider>,
    pub reviewer: Arc<dyn Reviewer>,
    pub git: Arc<dyn Git>,
    pub forge: Arc<dyn Forge>,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("unit {0:?} not found in the tasks directory")]
    UnknownUnit(String),
}

/// Terminal report for one run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub complete: usize,
    pub failed: usize,
    pub blocked: usize,
    /// Per-unit terminal (or abandoned) status.
    pub statuses: BTreeMap<String, UnitStatus>,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.failed == 0 && self.blocked == 0 && self.complete == self.total
    }
}

pub struct Orchestrator {
    config: Arc<RunConfig>,
    deps: EngineDeps,
    bus: EventBus,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        config: RunConfig,
        deps: EngineDeps,
        bus: EventBus,
        cancel: CancellationToken,
    ) -> Self {
        Self { config: Arc::new(config), deps, bus, cancel }
    }

    pub async fn run(&self) -> Result<RunSummary, RunError> {
        let mut units = discover(&self.config.tasks_dir)?;
        if let Some(only) = &self.config.only_unit {
            units = restrict_to(units, only)?;
        }

        let graph = UnitGraph::build(&units)?;
        let mut scheduler = Scheduler::new(graph, &units);

        // The layered DAG rides on orch.started so graph observers never
        // need a second channel.
        let layers = serde_json::to_value(scheduler.graph().layers())
            .unwrap_or(serde_json::Value::Null);
        self.emit(
            Event::new(EventKind::OrchStarted)
                .payload_field("units_total", units.len())
                .payload_field("parallelism", self.config.parallelism)
                .payload_field("layers", layers),
        );

        let worktrees = Arc::new(WorktreeManager::new(
            Arc::clone(&self.deps.git),
            self.config.repo_root.clone(),
            self.config.worktree_base.clone(),
            self.config.branch_prefix.clone(),
        ));
        let ctx = Arc::new(WorkerCtx {
            bus: self.bus.clone(),
            config: Arc::clone(&self.config),
            provider: Arc::clone(&self.deps.provider),
            reviewer: Arc::clone(&self.deps.reviewer),
            git: Arc::clone(&self.deps.git),
            forge: Arc::clone(&self.deps.forge),
            worktrees,
        });

        let by_id: BTreeMap<String, Unit> =
            units.into_iter().map(|u| (u.id.clone(), u)).collect();
        let mut pool = WorkerPool::new(self.config.parallelism);

        loop {
            if self.cancel.is_cancelled() && !scheduler.is_draining() {
                scheduler.drain();
            }

            // Fill free slots; the scheduler holds the backlog.
            while pool.has_capacity() {
                match scheduler.dispatch() {
                    Dispatch::Unit(id) => {
                        let Some(unit) = by_id.get(&id).cloned() else { break };
                        // Queued = dependencies satisfied, slot assigned.
                        self.emit(Event::new(EventKind::UnitQueued).unit(&id));
                        let worker =
                            Worker::new(Arc::clone(&ctx), unit, self.cancel.child_token());
                        if pool.try_submit(worker).is_err() {
                            break;
                        }
                    }
                    Dispatch::NoneReady | Dispatch::AllComplete | Dispatch::AllBlocked => break,
                }
            }

            if pool.active() == 0 {
                // Nothing running and nothing dispatchable: terminal or drained.
                break;
            }

            tokio::select! {
                done = pool.next_completion() => {
                    let Some((unit_id, outcome)) = done else { break };
                    match outcome {
                        WorkerOutcome::Complete => scheduler.complete(&unit_id),
                        WorkerOutcome::Failed(error) => {
                            tracing::warn!(unit = %unit_id, error = %error, "unit failed");
                            for blocked in scheduler.fail(&unit_id) {
                                self.emit(
                                    Event::new(EventKind::UnitBlocked)
                                        .unit(&blocked)
                                        .payload_field("failed_dependency", unit_id.as_str()),
                                );
                            }
                        }
                    }
                }
                _ = self.cancel.cancelled(), if !scheduler.is_draining() => {
                    scheduler.drain();
                }
            }
        }

        let summary = self.summarize(&scheduler, &by_id);
        let terminal = if summary.failed == 0 && summary.blocked == 0 && !self.cancel.is_cancelled()
        {
            EventKind::OrchCompleted
        } else {
            EventKind::OrchFailed
        };
        self.emit(
            Event::new(terminal)
                .payload_field("complete", summary.complete)
                .payload_field("failed", summary.failed)
                .payload_field("blocked", summary.blocked),
        );
        Ok(summary)
    }

    fn summarize(&self, scheduler: &Scheduler, by_id: &BTreeMap<String, Unit>) -> RunSummary {
        let counts = scheduler.summary();
        let statuses = by_id
            .keys()
            .filter_map(|id| scheduler.status_of(id).map(|s| (id.clone(), s)))
            .collect();
        RunSummary {
            total: counts.total,
            complete: counts.complete,
            failed: counts.failed,
            blocked: counts.blocked,
            statuses,
        }
    }

    fn emit(&self, event: Event) {
        if let Err(e) = self.bus.emit(event) {
            tracing::warn!("event bus rejected emission: {e}");
        }
    }
}

/// Keep `only` and its transitive dependencies.
fn restrict_to(units: Vec<Unit>, only: &str) -> Result<Vec<Unit>, RunError> {
    let by_id: BTreeMap<&str, &Unit> = units.iter().map(|u| (u.id.as_str(), u)).collect();
    if !by_id.contains_key(only) {
        return Err(RunError::UnknownUnit(only.to_string()));
    }

    let mut keep: BTreeSet<String> = BTreeSet::new();
    let mut stack = vec![only.to_string()];
    while let Some(id) = stack.pop() {
        if keep.insert(id.clone()) {
            if let Some(unit) = by_id.get(id.as_str()) {
                stack.extend(unit.depends_on.iter().cloned());
            }
        }
    }

    Ok(units.into_iter().filter(|u| keep.contains(&u.id)).collect())
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
