// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resume-after-crash specs: per-task boundary granularity.

use crate::prelude::*;
use choo_core::EventKind;
use choo_engine::Orchestrator;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn second_run_skips_completed_work() {
    let project = Project::empty();
    project.unit("api", &[], &[(1, "exit 0"), (2, "exit 0")]);

    // First run completes everything and writes statuses back.
    let (bus, _seen) = collecting_bus();
    let config = project.config().no_pr(true).build();
    Orchestrator::new(config, project.deps(), bus.clone(), CancellationToken::new())
        .run()
        .await
        .expect("first run");
    bus.close().await;

    // Second run over the same directory: the unit is already complete,
    // so nothing is dispatched and the run still reports success.
    let (bus, seen) = collecting_bus();
    let config = project.config().no_pr(true).build();
    let summary =
        Orchestrator::new(config, project.deps(), bus.clone(), CancellationToken::new())
            .run()
            .await
            .expect("second run");
    bus.close().await;

    assert_eq!(summary.complete, 1);
    assert!(seen.kinds().iter().all(|k| *k != EventKind::TaskStarted));
    assert_eq!(seen.kinds().last(), Some(&EventKind::OrchCompleted));
}

#[tokio::test]
async fn in_progress_task_from_a_dead_run_is_retried() {
    let project = Project::empty();
    project.unit("api", &[], &[]);
    // Simulate a crash mid-task: status stuck at in_progress.
    std::fs::write(
        project.tasks_dir().join("api").join("01-step.md"),
        "---\ntask: 1\nstatus: in_progress\nbackpressure: \"exit 0\"\n---\n# Step 1\n",
    )
    .expect("task");

    let (bus, seen) = collecting_bus();
    let config = project.config().no_pr(true).build();
    let summary =
        Orchestrator::new(config, project.deps(), bus.clone(), CancellationToken::new())
            .run()
            .await
            .expect("run");
    bus.close().await;

    // The task ran again from the boundary rather than being trusted.
    assert_eq!(summary.complete, 1);
    assert!(seen.kinds().contains(&EventKind::TaskStarted));
    assert!(seen.kinds().contains(&EventKind::TaskCompleted));

    let task = choo_discovery::TaskFile::load(
        &project.tasks_dir().join("api").join("01-step.md"),
    )
    .expect("task file");
    assert_eq!(task.task.status, choo_core::TaskStatus::Complete);
}

#[tokio::test]
async fn failed_unit_reruns_after_reset_state() {
    let project = Project::empty();
    project.unit("api", &[], &[(1, "exit 1")]);

    let (bus, _seen) = collecting_bus();
    let config = project.config().no_pr(true).max_retries(1).build();
    let summary =
        Orchestrator::new(config, project.deps(), bus.clone(), CancellationToken::new())
            .run()
            .await
            .expect("run");
    bus.close().await;
    assert_eq!(summary.failed, 1);

    // Fix the backpressure, reset state, run again.
    choo_discovery::reset_state(&project.tasks_dir().join("api")).expect("reset");
    std::fs::write(
        project.tasks_dir().join("api").join("01-step.md"),
        "---\ntask: 1\nstatus: pending\nbackpressure: \"exit 0\"\n---\n# Step 1\n",
    )
    .expect("task");

    let (bus, _seen) = collecting_bus();
    let config = project.config().no_pr(true).build();
    let summary =
        Orchestrator::new(config, project.deps(), bus.clone(), CancellationToken::new())
            .run()
            .await
            .expect("second run");
    bus.close().await;
    assert_eq!((summary.complete, summary.failed), (1, 0));
}
