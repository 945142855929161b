// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for workspace specs.

use choo_adapters::{FakeForge, FakeGit, FakeProvider, FakeReviewer};
use choo_core::{Event, EventBus, EventHandler, RunConfig};
use choo_engine::EngineDeps;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A scratch project: tasks directory plus fake collaborators.
pub struct Project {
    pub tmp: TempDir,
    pub provider: FakeProvider,
    pub reviewer: FakeReviewer,
    pub git: FakeGit,
    pub forge: FakeForge,
}

impl Project {
    pub fn empty() -> Self {
        Self::with_provider(FakeProvider::new())
    }

    pub fn with_provider(provider: FakeProvider) -> Self {
        Self {
            tmp: TempDir::new().expect("tempdir"),
            provider,
            reviewer: FakeReviewer::new(),
            git: FakeGit::new(),
            forge: FakeForge::new(),
        }
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.tmp.path().join("specs").join("tasks")
    }

    pub fn completed_dir(&self) -> PathBuf {
        self.tmp.path().join("specs").join("completed")
    }

    /// Write one unit directory.
    pub fn unit(&self, id: &str, depends_on: &[&str], tasks: &[(u32, &str)]) -> &Self {
        let dir = self.tasks_dir().join(id);
        std::fs::create_dir_all(&dir).expect("unit dir");
        let deps =
            depends_on.iter().map(|d| format!("\"{d}\"")).collect::<Vec<_>>().join(", ");
        std::fs::write(
            dir.join("IMPLEMENTATION_PLAN.md"),
            format!("---\nunit: {id}\ndepends_on: [{deps}]\n---\n# {id}\n"),
        )
        .expect("plan");
        for (number, backpressure) in tasks {
            std::fs::write(
                dir.join(format!("{number:02}-step.md")),
                format!(
                    "---\ntask: {number}\nstatus: pending\nbackpressure: \"{backpressure}\"\n---\n# Step {number}\n"
                ),
            )
            .expect("task");
        }
        self
    }

    pub fn config(&self) -> choo_core::RunConfigBuilder {
        RunConfig::builder(self.tasks_dir())
            .repo_root(self.tmp.path())
            .worktree_base(self.tmp.path().join("worktrees"))
            .review_poll_interval(std::time::Duration::from_millis(5))
            .kill_grace(std::time::Duration::from_millis(200))
    }

    pub fn deps(&self) -> EngineDeps {
        EngineDeps {
            provider: Arc::new(self.provider.clone()),
            reviewer: Arc::new(self.reviewer.clone()),
            git: Arc::new(self.git.clone()),
            forge: Arc::new(self.forge.clone()),
        }
    }

    pub fn path(&self) -> &Path {
        self.tmp.path()
    }
}

/// Events captured by a [`collecting_bus`] subscriber.
#[derive(Default)]
pub struct Collected(std::sync::Mutex<Vec<Event>>);

impl Collected {
    fn push(&self, event: Event) {
        self.0.lock().expect("collector lock").push(event);
    }

    pub fn all(&self) -> Vec<Event> {
        self.0.lock().expect("collector lock").clone()
    }

    pub fn kinds(&self) -> Vec<choo_core::EventKind> {
        self.all().iter().map(|e| e.kind).collect()
    }
}

/// Spawn the `choo` binary for black-box CLI specs.
pub fn cli() -> Cli {
    Cli { cmd: assert_cmd::Command::cargo_bin("choo").expect("choo binary") }
}

pub struct Cli {
    cmd: assert_cmd::Command,
}

impl Cli {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cmd.current_dir(dir);
        self
    }

    pub fn passes(mut self) -> CliOutput {
        CliOutput(self.cmd.assert().success())
    }

    pub fn fails_with(mut self, code: i32) -> CliOutput {
        CliOutput(self.cmd.assert().code(code))
    }
}

pub struct CliOutput(assert_cmd::assert::Assert);

impl CliOutput {
    pub fn stdout_has(self, needle: &str) -> Self {
        let stdout = String::from_utf8_lossy(&self.0.get_output().stdout).into_owned();
        assert!(stdout.contains(needle), "stdout missing {needle:?}:\n{stdout}");
        self
    }
}

/// Bus wired with a collecting handler, as every observer sees it.
pub fn collecting_bus() -> (EventBus, Arc<Collected>) {
    let bus = EventBus::new();
    let seen = Arc::new(Collected::default());
    let sink = Arc::clone(&seen);
    let handler: Arc<dyn EventHandler> =
        Arc::new(move |event: &Event| sink.push(event.clone()));
    bus.subscribe(handler);
    (bus, seen)
}
