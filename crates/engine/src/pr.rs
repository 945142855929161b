// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PR lifecycle: push, open, await review, merge.
//!
//! Transient forge errors retry with bounded backoff; a merge conflict
//! triggers exactly one rebase-and-retry before the unit fails.

use crate::worktree::Worktree;
use choo_adapters::{Forge, ForgeError, Git, PrRequest, ReviewState, VcsError};
use choo_core::{Event, EventBus, EventKind, RunConfig, TaskStatus, Unit};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Transient-failure retry bound for forge calls.
const FORGE_RETRIES: u32 = 3;
const FORGE_BACKOFF_BASE: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum PrError {
    #[error(transparent)]
    Forge(#[from] ForgeError),

    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error("review polling timed out after {0:?}")]
    ReviewTimeout(Duration),

    #[error("cancelled")]
    Cancelled,
}

/// What the review poll concluded.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewOutcome {
    Approved,
    ChangesRequested { feedback: String },
}

/// Push the unit branch and emit `branch.pushed`.
pub async fn push_branch(
    bus: &EventBus,
    git: &dyn Git,
    unit_id: &str,
    worktree: &Worktree,
) -> Result<(), PrError> {
    git.push(&worktree.path, &worktree.branch).await?;
    emit(
        bus,
        Event::new(EventKind::BranchPushed)
            .unit(unit_id)
            .payload_field("branch", worktree.branch.as_str()),
    );
    Ok(())
}

/// Open a PR for the unit, or reuse the number recorded in the plan.
///
/// A missing recorded number always opens a new PR; the back-reference
/// is never load-bearing.
pub async fn open_or_reuse_pr(
    bus: &EventBus,
    forge: &dyn Forge,
    config: &RunConfig,
    unit: &Unit,
    worktree: &Worktree,
    cancel: &CancellationToken,
) -> Result<u64, PrError> {
    if let Some(pr) = unit.pr_number {
        tracing::info!(unit = %unit.id, pr, "reusing recorded PR");
        return Ok(pr);
    }

    let request = build_pr_request(config, unit, worktree);
    let pr = forge_retry(cancel, || forge.open_pr(&worktree.path, &request)).await?;

    emit(
        bus,
        Event::new(EventKind::PrCreated)
            .unit(&unit.id)
            .pr(pr)
            .payload_field("title", request.title.as_str()),
    );
    Ok(pr)
}

/// Title from the unit id, body listing completed tasks.
pub fn build_pr_request(config: &RunConfig, unit: &Unit, worktree: &Worktree) -> PrRequest {
    let mut body = format!("Automated implementation of unit `{}`.\n\n## Completed tasks\n", unit.id);
    for task in unit.tasks.iter().filter(|t| t.status == TaskStatus::Complete) {
        body.push_str(&format!("- task {}: {}\n", task.number, task.title));
    }
    PrRequest {
        title: format!("{}: automated implementation", unit.id),
        body,
        head: worktree.branch.clone(),
        base: config.target_branch.clone(),
    }
}

/// Poll the forge until the review reaches a decision, emitting state
/// transitions along the way.
pub async fn await_review(
    bus: &EventBus,
    forge: &dyn Forge,
    config: &RunConfig,
    unit_id: &str,
    pr: u64,
    worktree: &Worktree,
    cancel: &CancellationToken,
) -> Result<ReviewOutcome, PrError> {
    let deadline = tokio::time::Instant::now() + config.review_timeout;
    let mut last_state: Option<EventKind> = None;

    loop {
        if cancel.is_cancelled() {
            return Err(PrError::Cancelled);
        }

        let state = forge_retry(cancel, || forge.review_state(&worktree.path, pr)).await?;
        match state {
            ReviewState::Pending => {
                transition(bus, &mut last_state, EventKind::PrReviewPending, unit_id, pr);
            }
            ReviewState::InProgress => {
                transition(bus, &mut last_state, EventKind::PrReviewInProgress, unit_id, pr);
            }
            ReviewState::Approved => {
                emit(bus, Event::new(EventKind::PrReviewApproved).unit(unit_id).pr(pr));
                return Ok(ReviewOutcome::Approved);
            }
            ReviewState::ChangesRequested { feedback } => {
                emit(
                    bus,
                    Event::new(EventKind::PrFeedbackReceived)
                        .unit(unit_id)
                        .pr(pr)
                        .payload_field("feedback", feedback.as_str()),
                );
                return Ok(ReviewOutcome::ChangesRequested { feedback });
            }
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(PrError::ReviewTimeout(config.review_timeout));
        }
        tokio::select! {
            _ = tokio::time::sleep(config.review_poll_interval) => {}
            _ = cancel.cancelled() => return Err(PrError::Cancelled),
        }
    }
}

/// Merge the PR. On conflict: rebase onto the updated target, push, and
/// retry exactly once.
pub async fn merge_with_rebase_retry(
    bus: &EventBus,
    forge: &dyn Forge,
    git: &dyn Git,
    config: &RunConfig,
    unit_id: &str,
    pr: u64,
    worktree: &Worktree,
    cancel: &CancellationToken,
) -> Result<(), PrError> {
    emit(bus, Event::new(EventKind::PrMergeQueued).unit(unit_id).pr(pr));

    match forge_retry(cancel, || forge.merge_pr(&worktree.path, pr)).await {
        Ok(()) => {
            emit(bus, Event::new(EventKind::PrMerged).unit(unit_id).pr(pr));
            return Ok(());
        }
        Err(ForgeError::Conflict(_)) => {
            emit(bus, Event::new(EventKind::PrConflict).unit(unit_id).pr(pr));
        }
        Err(err) => return Err(err.into()),
    }

    // One automated recovery: rebase against the moved target, push, retry.
    git.rebase_onto(&worktree.path, &config.target_branch).await?;
    git.push(&worktree.path, &worktree.branch).await?;

    match forge_retry(cancel, || forge.merge_pr(&worktree.path, pr)).await {
        Ok(()) => {
            emit(bus, Event::new(EventKind::PrMerged).unit(unit_id).pr(pr));
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn transition(
    bus: &EventBus,
    last: &mut Option<EventKind>,
    kind: EventKind,
    unit_id: &str,
    pr: u64,
) {
    if *last != Some(kind) {
        emit(bus, Event::new(kind).unit(unit_id).pr(pr));
        *last = Some(kind);
    }
}

/// Retry transient forge failures with exponential backoff.
async fn forge_retry<T, F, Fut>(cancel: &CancellationToken, op: F) -> Result<T, ForgeError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, ForgeError>>,
{
    let mut backoff = FORGE_BACKOFF_BASE;
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < FORGE_RETRIES => {
                attempt += 1;
                tracing::warn!(error = %err, attempt, "transient forge error; backing off");
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = cancel.cancelled() => return Err(err),
                }
                backoff *= 2;
            }
            Err(err) => return Err(err),
        }
    }
}

fn emit(bus: &EventBus, event: Event) {
    if let Err(e) = bus.emit(event) {
        tracing::warn!("event bus rejected emission: {e}");
    }
}

#[cfg(test)]
#[path = "pr_tests.rs"]
mod tests;
