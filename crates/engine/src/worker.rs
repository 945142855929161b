// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-unit worker: owns one unit from dispatch to terminal event.
//!
//! States: setup → task_loop → review → pr_lifecycle → cleanup.
//! Failure from any state goes terminal after best-effort cleanup;
//! worktrees of failed units are retained for inspection.

use crate::executor::{TaskExecutor, TaskOutcome};
use crate::pr::{self, PrError, ReviewOutcome};
use crate::review::run_review_loop;
use crate::worktree::{Worktree, WorktreeManager};
use choo_adapters::{Forge, Git, Provider, Reviewer};
use choo_core::{Event, EventBus, EventKind, RunConfig, TaskStatus, Unit, UnitStatus};
use choo_discovery::{plan::PLAN_FILENAME, writeback};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const FEEDBACK_COMMIT_MESSAGE: &str = "address PR review feedback";

/// Shared collaborators for all workers of one run.
pub struct WorkerCtx {
    pub bus: EventBus,
    pub config: Arc<RunConfig>,
    pub provider: Arc<dyn Provider>,
    pub reviewer: Arc<dyn Reviewer>,
    pub git: Arc<dyn Git>,
    pub forge: Arc<dyn Forge>,
    pub worktrees: Arc<WorktreeManager>,
}

/// Terminal result reported to the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    Complete,
    Failed(String),
}

enum TaskLoopResult {
    Done,
    Failed(String),
    Cancelled,
}

pub struct Worker {
    ctx: Arc<WorkerCtx>,
    unit: Unit,
    cancel: CancellationToken,
}

impl Worker {
    pub fn new(ctx: Arc<WorkerCtx>, unit: Unit, cancel: CancellationToken) -> Self {
        Self { ctx, unit, cancel }
    }

    pub fn unit_id(&self) -> &str {
        &self.unit.id
    }

    /// Drive the unit to a terminal state, emitting the full event
    /// sequence along the way.
    pub async fn run(mut self) -> WorkerOutcome {
        let unit_id = self.unit.id.clone();
        self.emit(Event::new(EventKind::UnitStarted).unit(&unit_id));

        // -- setup --
        let base_branch = self
            .ctx
            .config
            .feature_branch
            .clone()
            .unwrap_or_else(|| self.ctx.config.target_branch.clone());

        let worktree = match self.ctx.worktrees.create(&unit_id, &base_branch).await {
            Ok(worktree) => worktree,
            Err(err) => return self.fail(format!("worktree setup: {err}")).await,
        };
        self.emit(
            Event::new(EventKind::WorktreeCreated)
                .unit(&unit_id)
                .payload_field("path", worktree.path.display().to_string())
                .payload_field("branch", worktree.branch.as_str()),
        );
        self.record_started(&worktree);

        // -- task loop --
        match self.task_loop(&worktree, &[]).await {
            TaskLoopResult::Done => {}
            TaskLoopResult::Failed(err) => return self.fail(err).await,
            TaskLoopResult::Cancelled => return self.fail("cancelled".to_string()).await,
        }

        // -- review (advisory; never fails the unit) --
        run_review_loop(
            &self.ctx.bus,
            self.ctx.reviewer.as_ref(),
            self.ctx.provider.as_ref(),
            self.ctx.git.as_ref(),
            &self.ctx.config,
            &self.unit.id,
            &worktree,
            &self.cancel,
        )
        .await;

        // -- pr lifecycle --
        if !self.ctx.config.no_pr {
            if let Err(err) = self.pr_lifecycle(&worktree).await {
                self.emit(
                    Event::new(EventKind::PrFailed).unit(&self.unit.id).error(err.to_string()),
                );
                return self.fail(format!("pr lifecycle: {err}")).await;
            }
        }

        // -- cleanup --
        if let Err(err) = self.ctx.worktrees.remove(&self.unit.id, true).await {
            tracing::warn!(unit = %self.unit.id, error = %err, "worktree removal failed");
        }
        self.emit(Event::new(EventKind::WorktreeRemoved).unit(&self.unit.id));
        self.record_completed(UnitStatus::Complete);
        self.emit(Event::new(EventKind::UnitCompleted).unit(&self.unit.id));
        WorkerOutcome::Complete
    }

    /// Run tasks until none remain ready. Cancellation is honored at
    /// task boundaries only; the current task always runs to its
    /// boundary.
    async fn task_loop(&mut self, worktree: &Worktree, extra_context: &[String]) -> TaskLoopResult {
        let executor = TaskExecutor::new(
            Arc::clone(&self.ctx.provider),
            self.ctx.bus.clone(),
            Arc::clone(&self.ctx.config),
            self.cancel.clone(),
        );

        loop {
            let Some(task) = self.unit.next_ready_task().cloned() else {
                if self.unit.all_tasks_complete() || self.unit.tasks.is_empty() {
                    return TaskLoopResult::Done;
                }
                return TaskLoopResult::Failed("no ready task but unit incomplete".to_string());
            };
            if self.cancel.is_cancelled() {
                return TaskLoopResult::Cancelled;
            }

            self.set_task_status(task.number, TaskStatus::InProgress);
            self.emit(
                Event::new(EventKind::TaskStarted)
                    .unit(&self.unit.id)
                    .task(task.number)
                    .payload_field("title", task.title.as_str()),
            );

            match executor.execute(&self.unit.id, &task, worktree, extra_context).await {
                TaskOutcome::Complete => {
                    if let Err(err) = self.commit_task(&task, worktree).await {
                        self.set_task_status(task.number, TaskStatus::Failed);
                        self.emit(
                            Event::new(EventKind::TaskFailed)
                                .unit(&self.unit.id)
                                .task(task.number)
                                .error(&err),
                        );
                        return TaskLoopResult::Failed(err);
                    }
                    self.set_task_status(task.number, TaskStatus::Complete);
                    self.emit(
                        Event::new(EventKind::TaskCompleted).unit(&self.unit.id).task(task.number),
                    );
                }
                TaskOutcome::Failed(err) => {
                    self.set_task_status(task.number, TaskStatus::Failed);
                    self.emit(
                        Event::new(EventKind::TaskFailed)
                            .unit(&self.unit.id)
                            .task(task.number)
                            .error(&err),
                    );
                    return TaskLoopResult::Failed(format!("task {}: {err}", task.number));
                }
                TaskOutcome::Cancelled => return TaskLoopResult::Cancelled,
            }
        }
    }

    /// Stage and commit whatever the provider changed, with the
    /// deterministic `task N: <title>` message.
    async fn commit_task(
        &self,
        task: &choo_core::Task,
        worktree: &Worktree,
    ) -> Result<(), String> {
        let changed = self
            .ctx
            .git
            .changed_files(&worktree.path)
            .await
            .map_err(|e| format!("detect changes: {e}"))?;
        if changed.is_empty() {
            return Ok(());
        }

        self.ctx.git.stage_all(&worktree.path).await.map_err(|e| format!("stage: {e}"))?;
        let message = format!("task {}: {}", task.number, task.title);
        self.ctx
            .git
            .commit(&worktree.path, &message, false)
            .await
            .map_err(|e| format!("commit: {e}"))?;

        self.emit(
            Event::new(EventKind::TaskCommitted)
                .unit(&self.unit.id)
                .task(task.number)
                .payload_field("files", changed.len())
                .payload_field("message", message.as_str()),
        );
        Ok(())
    }

    /// Push, open (or reuse) the PR, await review with bounded feedback
    /// re-entry, then merge.
    async fn pr_lifecycle(&mut self, worktree: &Worktree) -> Result<(), PrError> {
        pr::push_branch(&self.ctx.bus, self.ctx.git.as_ref(), &self.unit.id, worktree).await?;

        let number = pr::open_or_reuse_pr(
            &self.ctx.bus,
            self.ctx.forge.as_ref(),
            &self.ctx.config,
            &self.unit,
            worktree,
            &self.cancel,
        )
        .await?;
        self.unit.pr_number = Some(number);
        match writeback::record_pr_number(&self.plan_path(), number) {
            Ok(true) => {}
            Ok(false) => tracing::debug!(unit = %self.unit.id, "plan already records a PR number"),
            Err(err) => tracing::warn!(unit = %self.unit.id, error = %err, "PR number writeback failed"),
        }

        if !self.ctx.config.skip_review {
            let mut rounds = 0;
            loop {
                let outcome = pr::await_review(
                    &self.ctx.bus,
                    self.ctx.forge.as_ref(),
                    &self.ctx.config,
                    &self.unit.id,
                    number,
                    worktree,
                    &self.cancel,
                )
                .await?;

                match outcome {
                    ReviewOutcome::Approved => break,
                    ReviewOutcome::ChangesRequested { feedback } => {
                        if rounds >= self.ctx.config.max_feedback_rounds {
                            tracing::warn!(
                                unit = %self.unit.id,
                                rounds,
                                "feedback rounds exhausted; attempting merge anyway"
                            );
                            break;
                        }
                        rounds += 1;
                        self.address_feedback(worktree, number, &feedback).await;
                    }
                }
            }
        }

        pr::merge_with_rebase_retry(
            &self.ctx.bus,
            self.ctx.forge.as_ref(),
            self.ctx.git.as_ref(),
            &self.ctx.config,
            &self.unit.id,
            number,
            worktree,
            &self.cancel,
        )
        .await
    }

    /// One feedback round: invoke the provider with the reviewer's
    /// comments as context, commit and push whatever changed.
    async fn address_feedback(&mut self, worktree: &Worktree, number: u64, feedback: &str) {
        let context =
            [format!("A reviewer requested changes on the pull request:\n{feedback}")];
        match self.task_loop_feedback(worktree, &context).await {
            Ok(()) => {
                self.emit(
                    Event::new(EventKind::PrFeedbackAddressed).unit(&self.unit.id).pr(number),
                );
            }
            Err(err) => {
                tracing::warn!(unit = %self.unit.id, error = %err, "feedback round failed");
            }
        }
    }

    /// The feedback re-entry into the task loop. All tasks are complete,
    /// so this runs the provider once over the unit with the feedback as
    /// prompt context and commits the result.
    async fn task_loop_feedback(
        &mut self,
        worktree: &Worktree,
        context: &[String],
    ) -> Result<(), String> {
        let prompt = crate::executor::build_task_prompt(
            &choo_core::Task {
                number: 0,
                title: format!("address review feedback for {}", self.unit.id),
                status: TaskStatus::Pending,
                backpressure: None,
                depends_on: Default::default(),
                file_path: Default::default(),
                body: String::new(),
            },
            &[],
            context,
        );

        let invoke = self.ctx.provider.invoke(
            &prompt,
            &worktree.path,
            &|line: &str| tracing::debug!(target: "provider", "{line}"),
            &|line: &str| tracing::debug!(target: "provider", "{line}"),
        );
        tokio::select! {
            result = invoke => result.map_err(|e| e.to_string())?,
            _ = self.cancel.cancelled() => return Err("cancelled".to_string()),
        }

        let changed = self
            .ctx
            .git
            .changed_files(&worktree.path)
            .await
            .map_err(|e| e.to_string())?;
        if !changed.is_empty() {
            self.ctx.git.stage_all(&worktree.path).await.map_err(|e| e.to_string())?;
            self.ctx
                .git
                .commit(&worktree.path, FEEDBACK_COMMIT_MESSAGE, false)
                .await
                .map_err(|e| e.to_string())?;
        }
        self.ctx
            .git
            .push(&worktree.path, &worktree.branch)
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Terminal failure: release (but keep) the worktree, record state,
    /// emit `unit.failed`.
    async fn fail(self, error: String) -> WorkerOutcome {
        self.ctx.worktrees.release(&self.unit.id);
        self.record_completed(UnitStatus::Failed);
        self.emit(Event::new(EventKind::UnitFailed).unit(&self.unit.id).error(&error));
        WorkerOutcome::Failed(error)
    }

    fn plan_path(&self) -> std::path::PathBuf {
        self.unit.path.join(PLAN_FILENAME)
    }

    fn record_started(&self, worktree: &Worktree) {
        let plan = self.plan_path();
        if !plan.exists() {
            return;
        }
        if let Err(err) = writeback::record_started(&plan, &worktree.branch, chrono::Utc::now()) {
            tracing::warn!(unit = %self.unit.id, error = %err, "start writeback failed");
        }
    }

    fn record_completed(&self, status: UnitStatus) {
        let plan = self.plan_path();
        if !plan.exists() {
            return;
        }
        if let Err(err) = writeback::record_completed(&plan, status, chrono::Utc::now()) {
            tracing::warn!(unit = %self.unit.id, error = %err, "completion writeback failed");
        }
    }

    fn set_task_status(&mut self, number: u32, status: TaskStatus) {
        if let Some(task) = self.unit.task_mut(number) {
            task.status = status;
        }
        let path = match self.unit.task(number) {
            Some(task) => self.unit.path.join(&task.file_path),
            None => return,
        };
        if !path.exists() {
            return;
        }
        if let Err(err) = writeback::set_task_status(&path, status) {
            tracing::warn!(unit = %self.unit.id, task = number, error = %err, "task writeback failed");
        }
    }

    fn emit(&self, event: Event) {
        if let Err(e) = self.ctx.bus.emit(event) {
            tracing::warn!("event bus rejected emission: {e}");
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
