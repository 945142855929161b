// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task executor: provider invocation plus backpressure validation.
//!
//! Prompt construction is deterministic: the same task text always
//! yields the same prompt, and no run-specific absolute path ever goes
//! into it, so provider-side prompt caches stay warm across runs.

use crate::worktree::Worktree;
use choo_adapters::subprocess::{run_cancellable, SubprocessError};
use choo_adapters::{Provider, ProviderError};
use choo_core::{Event, EventBus, EventKind, RunConfig, Task};
use std::sync::Arc;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Lines of validation output attached to failure events.
const OUTPUT_PAYLOAD_LINES: usize = 20;

const PROMPT_PRELUDE: &str = "You are completing one task of a development unit inside an isolated worktree.\n\
Make exactly the changes the task describes and keep the diff focused.\n\
Do not commit; the orchestrator commits for you.";

/// Result of driving one task to its boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Complete,
    Failed(String),
    Cancelled,
}

/// Drives a single task: provider, backpressure, bounded retries.
pub struct TaskExecutor {
    provider: Arc<dyn Provider>,
    bus: EventBus,
    config: Arc<RunConfig>,
    cancel: CancellationToken,
}

impl TaskExecutor {
    pub fn new(
        provider: Arc<dyn Provider>,
        bus: EventBus,
        config: Arc<RunConfig>,
        cancel: CancellationToken,
    ) -> Self {
        Self { provider, bus, config, cancel }
    }

    /// Run the task until the backpressure command accepts it, retrying
    /// up to `max_retries` attempts with the captured failure output
    /// appended as context.
    pub async fn execute(
        &self,
        unit_id: &str,
        task: &Task,
        worktree: &Worktree,
        extra_context: &[String],
    ) -> TaskOutcome {
        let max_attempts = self.config.max_retries.max(1);
        let mut retry_context: Vec<String> = Vec::new();

        for attempt in 1..=max_attempts {
            if self.cancel.is_cancelled() {
                return TaskOutcome::Cancelled;
            }

            let prompt = build_task_prompt(task, &retry_context, extra_context);
            self.emit(
                Event::new(EventKind::TaskClaudeInvoke)
                    .unit(unit_id)
                    .task(task.number)
                    .payload_field("provider", self.provider.name().as_str())
                    .payload_field("attempt", attempt),
            );

            let invoke = self.provider.invoke(
                &prompt,
                &worktree.path,
                &|line: &str| tracing::debug!(target: "provider", "{line}"),
                &|line: &str| tracing::debug!(target: "provider", "{line}"),
            );
            let provider_result = tokio::select! {
                result = invoke => result,
                _ = self.cancel.cancelled() => Err(ProviderError::Cancelled),
            };

            match provider_result {
                Ok(()) => {
                    self.emit(
                        Event::new(EventKind::TaskClaudeDone).unit(unit_id).task(task.number),
                    );
                }
                Err(ProviderError::Cancelled) => return TaskOutcome::Cancelled,
                Err(err) => {
                    let detail = err.to_string();
                    if attempt < max_attempts {
                        retry_context.push(format!("The previous attempt failed: {detail}"));
                        self.emit(
                            Event::new(EventKind::TaskRetry)
                                .unit(unit_id)
                                .task(task.number)
                                .payload_field("attempt", attempt)
                                .error(&detail),
                        );
                        continue;
                    }
                    return TaskOutcome::Failed(detail);
                }
            }

            match self.validate(unit_id, task, worktree).await {
                Validation::Pass => return TaskOutcome::Complete,
                Validation::Cancelled => return TaskOutcome::Cancelled,
                Validation::Fail(output) => {
                    if attempt < max_attempts {
                        retry_context.push(format!(
                            "The validation command failed on the previous attempt. Output:\n{output}"
                        ));
                        self.emit(
                            Event::new(EventKind::TaskRetry)
                                .unit(unit_id)
                                .task(task.number)
                                .payload_field("attempt", attempt)
                                .payload_field("retry_context", output.as_str()),
                        );
                    } else {
                        return TaskOutcome::Failed(format!(
                            "validation failed after {max_attempts} attempts"
                        ));
                    }
                }
            }
        }

        TaskOutcome::Failed("retries exhausted".to_string())
    }

    /// Run the task's backpressure command in the worktree. A task
    /// without backpressure passes by default.
    async fn validate(&self, unit_id: &str, task: &Task, worktree: &Worktree) -> Validation {
        let Some(command) = task.backpressure.as_deref() else {
            return Validation::Pass;
        };

        self.emit(
            Event::new(EventKind::TaskBackpressure)
                .unit(unit_id)
                .task(task.number)
                .payload_field("command", command),
        );

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command).current_dir(&worktree.path);

        let result = run_cancellable(
            cmd,
            self.config.provider_timeout,
            self.config.kill_grace,
            &self.cancel,
            "backpressure",
        )
        .await;

        match result {
            Ok(out) if out.success() => {
                self.emit(
                    Event::new(EventKind::TaskValidationOk).unit(unit_id).task(task.number),
                );
                Validation::Pass
            }
            Ok(out) => {
                let output = out.first_lines(OUTPUT_PAYLOAD_LINES);
                self.emit(
                    Event::new(EventKind::TaskValidationFail)
                        .unit(unit_id)
                        .task(task.number)
                        .payload_field("output", output.as_str())
                        .payload_field("exit_code", out.code.unwrap_or(-1))
                        .error(format!("backpressure exited with {}", out.code.unwrap_or(-1))),
                );
                Validation::Fail(output)
            }
            Err(SubprocessError::Cancelled { .. }) => Validation::Cancelled,
            Err(err) => {
                let detail = err.to_string();
                self.emit(
                    Event::new(EventKind::TaskValidationFail)
                        .unit(unit_id)
                        .task(task.number)
                        .error(&detail),
                );
                Validation::Fail(detail)
            }
        }
    }

    fn emit(&self, event: Event) {
        if let Err(e) = self.bus.emit(event) {
            tracing::warn!("event bus rejected emission: {e}");
        }
    }
}

enum Validation {
    Pass,
    Fail(String),
    Cancelled,
}

/// Deterministic prompt: fixed prelude, literal task body, backpressure
/// command, then any feedback/retry context.
pub fn build_task_prompt(task: &Task, retry_context: &[String], extra_context: &[String]) -> String {
    let mut prompt = String::new();
    prompt.push_str(PROMPT_PRELUDE);
    prompt.push_str("\n\n## Task: ");
    prompt.push_str(&task.title);
    prompt.push('\n');
    prompt.push_str(task.body.trim());
    prompt.push('\n');

    if let Some(backpressure) = &task.backpressure {
        prompt.push_str("\n## Validation\nThis command must exit 0 when you are done:\n```\n");
        prompt.push_str(backpressure);
        prompt.push_str("\n```\n");
    }

    for context in extra_context {
        prompt.push_str("\n## Additional context\n");
        prompt.push_str(context.trim());
        prompt.push('\n');
    }

    for context in retry_context {
        prompt.push_str("\n## Retry context\n");
        prompt.push_str(context.trim());
        prompt.push('\n');
    }

    prompt
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
