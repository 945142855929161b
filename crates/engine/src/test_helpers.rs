// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

use crate::worker::WorkerCtx;
use crate::worktree::WorktreeManager;
use choo_adapters::{FakeForge, FakeGit, FakeProvider, FakeReviewer};
use choo_core::{Event, EventBus, EventHandler, EventKind, RunConfig};
use parking_lot::Mutex as PlMutex;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Everything a worker/run test needs, with fakes wired in.
pub struct EngineFixture {
    pub tmp: TempDir,
    pub bus: EventBus,
    pub seen: Arc<PlMutex<Vec<Event>>>,
    pub provider: FakeProvider,
    pub reviewer: FakeReviewer,
    pub git: FakeGit,
    pub forge: FakeForge,
}

impl EngineFixture {
    pub fn new() -> Self {
        Self::with_provider(FakeProvider::new())
    }

    pub fn with_provider(provider: FakeProvider) -> Self {
        let tmp = TempDir::new().unwrap();
        let bus = EventBus::new();
        let seen: Arc<PlMutex<Vec<Event>>> = Arc::new(PlMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: Arc<dyn EventHandler> =
            Arc::new(move |event: &Event| sink.lock().push(event.clone()));
        bus.subscribe(handler);

        Self {
            tmp,
            bus,
            seen,
            provider,
            reviewer: FakeReviewer::new(),
            git: FakeGit::new(),
            forge: FakeForge::new(),
        }
    }

    pub fn tasks_dir(&self) -> std::path::PathBuf {
        self.tmp.path().join("specs").join("tasks")
    }

    /// Quick-running config over the fixture's directories.
    pub fn config(&self) -> choo_core::RunConfigBuilder {
        RunConfig::builder(self.tasks_dir())
            .repo_root(self.tmp.path())
            .worktree_base(self.tmp.path().join("worktrees"))
            .review_poll_interval(std::time::Duration::from_millis(5))
            .review_timeout(std::time::Duration::from_secs(5))
            .kill_grace(std::time::Duration::from_millis(200))
    }

    pub fn worker_ctx(&self, config: RunConfig) -> Arc<WorkerCtx> {
        let config = Arc::new(config);
        let worktrees = Arc::new(WorktreeManager::new(
            Arc::new(self.git.clone()),
            config.repo_root.clone(),
            config.worktree_base.clone(),
            config.branch_prefix.clone(),
        ));
        Arc::new(WorkerCtx {
            bus: self.bus.clone(),
            config,
            provider: Arc::new(self.provider.clone()),
            reviewer: Arc::new(self.reviewer.clone()),
            git: Arc::new(self.git.clone()),
            forge: Arc::new(self.forge.clone()),
            worktrees,
        })
    }

    pub fn deps(&self) -> crate::run::EngineDeps {
        crate::run::EngineDeps {
            provider: Arc::new(self.provider.clone()),
            reviewer: Arc::new(self.reviewer.clone()),
            git: Arc::new(self.git.clone()),
            forge: Arc::new(self.forge.clone()),
        }
    }

    /// Events observed so far (close the bus first for a settled view).
    pub fn kinds(&self) -> Vec<EventKind> {
        self.seen.lock().iter().map(|e| e.kind).collect()
    }

    pub fn events(&self) -> Vec<Event> {
        self.seen.lock().clone()
    }
}

/// Write a unit directory with the given dependencies and tasks.
pub fn seed_unit(
    tasks_dir: &Path,
    id: &str,
    depends_on: &[&str],
    tasks: &[(u32, &str)],
) {
    let dir = tasks_dir.join(id);
    std::fs::create_dir_all(&dir).unwrap();
    let deps = depends_on
        .iter()
        .map(|d| format!("\"{d}\""))
        .collect::<Vec<_>>()
        .join(", ");
    std::fs::write(
        dir.join("IMPLEMENTATION_PLAN.md"),
        format!("---\nunit: {id}\ndepends_on: [{deps}]\n---\n# {id}\n\nPlan body.\n"),
    )
    .unwrap();
    for (number, backpressure) in tasks {
        std::fs::write(
            dir.join(format!("{number:02}-task.md")),
            format!(
                "---\ntask: {number}\nstatus: pending\nbackpressure: \"{backpressure}\"\n---\n# Task {number} of {id}\n\nDo the work.\n"
            ),
        )
        .unwrap();
    }
}

/// A backpressure command that fails `fails` times before passing.
pub fn flaky_backpressure(fails: u32) -> String {
    let threshold = fails + 1;
    format!(
        "c=$(cat .attempts 2>/dev/null || echo 0); c=$((c+1)); echo $c > .attempts; [ $c -ge {threshold} ]"
    )
}
