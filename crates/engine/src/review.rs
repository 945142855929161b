// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advisory code-review loop.
//!
//! Review runs after the task loop against the local target branch and
//! never blocks the merge: every failure path here logs, emits, and
//! returns. Fix attempts reuse the same provider that executed tasks.

use crate::worktree::Worktree;
use choo_adapters::{Git, Provider, ProviderError, ReviewIssue, Reviewer};
use choo_core::{Event, EventBus, EventKind, RunConfig};
use tokio_util::sync::CancellationToken;

const FIX_COMMIT_MESSAGE: &str = "fix: address code review feedback";

/// Run the advisory review over the unit's accumulated diff.
pub async fn run_review_loop(
    bus: &EventBus,
    reviewer: &dyn Reviewer,
    provider: &dyn Provider,
    git: &dyn Git,
    config: &RunConfig,
    unit_id: &str,
    worktree: &Worktree,
    cancel: &CancellationToken,
) {
    let emit = |event: Event| {
        if let Err(e) = bus.emit(event) {
            tracing::warn!("event bus rejected emission: {e}");
        }
    };

    emit(Event::new(EventKind::CodeReviewStarted).unit(unit_id));

    // base_ref is the local target branch: it captures prior-unit merges
    // that have not been pushed yet.
    let result = match reviewer.review(&worktree.path, &config.target_branch).await {
        Ok(result) => result,
        Err(err) => {
            tracing::warn!(unit = unit_id, error = %err, "reviewer unavailable");
            emit(Event::new(EventKind::CodeReviewFailed).unit(unit_id).error(err.to_string()));
            return;
        }
    };

    if result.passed || result.issues.is_empty() {
        emit(
            Event::new(EventKind::CodeReviewPassed)
                .unit(unit_id)
                .payload_field("summary", result.summary.as_str()),
        );
        return;
    }

    emit(
        Event::new(EventKind::CodeReviewIssuesFound)
            .unit(unit_id)
            .payload_field("count", result.issues.len())
            .payload_field("summary", result.summary.as_str()),
    );

    if config.max_fix_iterations == 0 {
        return;
    }

    let fix_prompt = build_fix_prompt(&result.summary, &result.issues);
    for iteration in 1..=config.max_fix_iterations {
        if cancel.is_cancelled() {
            return;
        }

        emit(
            Event::new(EventKind::CodeReviewFixAttempt)
                .unit(unit_id)
                .payload_field("iteration", iteration)
                .payload_field("max", config.max_fix_iterations),
        );

        match attempt_fix(provider, git, &fix_prompt, worktree, cancel).await {
            Ok(true) => {
                emit(Event::new(EventKind::CodeReviewFixApplied).unit(unit_id));
                return;
            }
            Ok(false) => {
                // Provider ran but left nothing to commit; retry until
                // the iteration bound is spent.
                tracing::info!(unit = unit_id, "fix attempt produced no changes");
            }
            Err(err) => {
                tracing::warn!(unit = unit_id, error = %err, "fix attempt failed; cleaning");
                git.clean_worktree(&worktree.path).await;
            }
        }
    }
    // Iterations exhausted. Merge proceeds regardless.
    git.clean_worktree(&worktree.path).await;
    emit(
        Event::new(EventKind::CodeReviewFailed)
            .unit(unit_id)
            .error("fix attempts exhausted"),
    );
}

/// One fix attempt: invoke the provider, then commit anything it left
/// uncommitted. Returns whether a fix commit was created.
async fn attempt_fix(
    provider: &dyn Provider,
    git: &dyn Git,
    prompt: &str,
    worktree: &Worktree,
    cancel: &CancellationToken,
) -> Result<bool, FixError> {
    let invoke = provider.invoke(
        prompt,
        &worktree.path,
        &|line: &str| tracing::debug!(target: "provider", "{line}"),
        &|line: &str| tracing::debug!(target: "provider", "{line}"),
    );
    tokio::select! {
        result = invoke => result?,
        _ = cancel.cancelled() => return Err(FixError::Provider(ProviderError::Cancelled)),
    }

    if !git.has_uncommitted_changes(&worktree.path).await? {
        return Ok(false);
    }
    git.stage_all(&worktree.path).await?;
    git.commit(&worktree.path, FIX_COMMIT_MESSAGE, true).await?;
    Ok(true)
}

#[derive(Debug, thiserror::Error)]
enum FixError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Vcs(#[from] choo_adapters::VcsError),
}

/// Numbered, severity-tagged issue list for the fix prompt.
fn build_fix_prompt(summary: &str, issues: &[ReviewIssue]) -> String {
    let mut prompt = String::from(
        "A code review of your changes found issues. Address each one.\n\nSummary: ",
    );
    prompt.push_str(summary);
    prompt.push_str("\n\n");
    for (i, issue) in issues.iter().enumerate() {
        prompt.push_str(&format!("{}. [{}] ", i + 1, issue.severity));
        match (&issue.file, issue.line) {
            (Some(file), Some(line)) => prompt.push_str(&format!("{file}:{line}: ")),
            (Some(file), None) => prompt.push_str(&format!("{file}: ")),
            _ => {}
        }
        prompt.push_str(&issue.message);
        if let Some(suggestion) = &issue.suggestion {
            prompt.push_str(&format!("\n   Suggestion: {suggestion}"));
        }
        prompt.push('\n');
    }
    prompt
}

#[cfg(test)]
#[path = "review_tests.rs"]
mod tests;
