// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test builders shared across crates (behind the `test-support` feature).

use crate::unit::{Task, TaskStatus, Unit, UnitStatus};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Builder for [`Task`] values with sensible test defaults.
pub struct TaskBuilder {
    number: u32,
    title: String,
    status: TaskStatus,
    backpressure: Option<String>,
    depends_on: BTreeSet<u32>,
    body: String,
}

impl TaskBuilder {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            title: format!("task {number}"),
            status: TaskStatus::Pending,
            backpressure: None,
            depends_on: BTreeSet::new(),
            body: String::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn backpressure(mut self, cmd: impl Into<String>) -> Self {
        self.backpressure = Some(cmd.into());
        self
    }

    pub fn depends_on(mut self, deps: impl IntoIterator<Item = u32>) -> Self {
        self.depends_on = deps.into_iter().collect();
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self) -> Task {
        Task {
            file_path: PathBuf::from(format!(
                "{:02}-{}.md",
                self.number,
                self.title.to_lowercase().replace(' ', "-")
            )),
            number: self.number,
            title: self.title,
            status: self.status,
            backpressure: self.backpressure,
            depends_on: self.depends_on,
            body: self.body,
        }
    }
}

/// Builder for [`Unit`] values with sensible test defaults.
pub struct UnitBuilder {
    id: String,
    depends_on: BTreeSet<String>,
    status: Option<UnitStatus>,
    tasks: Vec<Task>,
    provider: Option<String>,
}

impl UnitBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            depends_on: BTreeSet::new(),
            status: None,
            tasks: Vec::new(),
            provider: None,
        }
    }

    pub fn depends_on<S: Into<String>>(mut self, deps: impl IntoIterator<Item = S>) -> Self {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn status(mut self, status: UnitStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn task(mut self, task: TaskBuilder) -> Self {
        self.tasks.push(task.build());
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn build(self) -> Unit {
        let status = self.status.unwrap_or_else(|| Unit::derived_status(&self.tasks));
        Unit {
            path: PathBuf::from(format!("specs/tasks/{}", self.id)),
            id: self.id,
            depends_on: self.depends_on,
            status,
            tasks: self.tasks,
            provider: self.provider,
            pr_number: None,
            started_at: None,
            completed_at: None,
        }
    }
}
