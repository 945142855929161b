// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Full-pipeline orchestration specs.

use crate::prelude::*;
use choo_core::EventKind;
use choo_engine::Orchestrator;
use choo_storage::{JobEventLog, SnapshotWriter};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn full_run_feeds_every_observer() {
    let project = Project::empty();
    project.unit("core", &[], &[(1, "exit 0")]);
    project.unit("api", &["core"], &[(1, "exit 0")]);

    let (bus, seen) = collecting_bus();
    let log = JobEventLog::new();
    bus.subscribe(Arc::new(log.clone()));
    let snapshot_path = project.path().join("snapshot.json");
    bus.subscribe(Arc::new(SnapshotWriter::new(&snapshot_path)));

    let config = project.config().no_pr(true).build();
    let orchestrator =
        Orchestrator::new(config, project.deps(), bus.clone(), CancellationToken::new());
    let summary = orchestrator.run().await.expect("run");
    bus.close().await;

    // Scheduler summary, event stream, event log, and snapshot agree.
    assert_eq!((summary.complete, summary.failed, summary.blocked), (2, 0, 0));

    let kinds = seen.kinds();
    assert_eq!(kinds.first(), Some(&EventKind::OrchStarted));
    assert_eq!(kinds.last(), Some(&EventKind::OrchCompleted));
    assert_eq!(log.head(), kinds.len() as u64);

    let state = SnapshotWriter::load(&snapshot_path).expect("snapshot");
    assert_eq!(state.counts(), (2, 0, 0, 2));
    assert_eq!(state.units["core"].status, choo_core::UnitStatus::Complete);
    assert_eq!(state.units["api"].status, choo_core::UnitStatus::Complete);
}

#[tokio::test]
async fn pr_mode_records_numbers_on_disk_and_in_state() {
    let project = Project::with_provider(choo_adapters::FakeProvider::writing_file("impl.rs"));
    project.unit("api", &[], &[(1, "exit 0")]);

    let (bus, _seen) = collecting_bus();
    let snapshot_path = project.path().join("snapshot.json");
    bus.subscribe(Arc::new(SnapshotWriter::new(&snapshot_path)));

    let config = project.config().skip_review(true).build();
    let orchestrator =
        Orchestrator::new(config, project.deps(), bus.clone(), CancellationToken::new());
    let summary = orchestrator.run().await.expect("run");
    bus.close().await;

    assert_eq!(summary.complete, 1);
    assert_eq!(project.forge.merged_prs(), vec![100]);

    // Plan front matter carries the PR back-reference.
    let plan = choo_discovery::PlanFile::load(
        &project.tasks_dir().join("api").join("IMPLEMENTATION_PLAN.md"),
    )
    .expect("plan");
    assert_eq!(plan.pr_number, Some(100));

    let state = SnapshotWriter::load(&snapshot_path).expect("snapshot");
    assert_eq!(state.units["api"].pr_number, Some(100));
}

#[tokio::test]
async fn archive_after_run_moves_completed_units() {
    let project = Project::empty();
    project.unit("done", &[], &[(1, "exit 0")]);

    let (bus, _seen) = collecting_bus();
    let config = project.config().no_pr(true).build();
    Orchestrator::new(config, project.deps(), bus.clone(), CancellationToken::new())
        .run()
        .await
        .expect("run");
    bus.close().await;

    let dest =
        choo_discovery::archive_unit(&project.tasks_dir(), &project.completed_dir(), "done")
            .expect("archive");
    assert!(dest.join("IMPLEMENTATION_PLAN.md").exists());
    assert!(!project.tasks_dir().join("done").exists());
}

#[tokio::test]
async fn failed_run_leaves_partial_archive_impossible() {
    let project = Project::empty();
    project.unit("broken", &[], &[(1, "exit 1"), (2, "exit 0")]);

    let (bus, _seen) = collecting_bus();
    let config = project.config().no_pr(true).max_retries(1).build();
    let summary =
        Orchestrator::new(config, project.deps(), bus.clone(), CancellationToken::new())
            .run()
            .await
            .expect("run");
    bus.close().await;

    assert_eq!(summary.failed, 1);
    let err = choo_discovery::archive_unit(
        &project.tasks_dir(),
        &project.completed_dir(),
        "broken",
    )
    .expect_err("must refuse");
    assert!(matches!(err, choo_discovery::ArchiveError::Incomplete { .. }));
    // Nothing moved.
    assert!(project.tasks_dir().join("broken").join("01-step.md").exists());
}

#[tokio::test]
async fn event_stream_respects_dependency_order_across_observers() {
    let project = Project::empty();
    project.unit("base", &[], &[(1, "exit 0")]);
    project.unit("mid", &["base"], &[(1, "exit 0")]);
    project.unit("top", &["mid"], &[(1, "exit 0")]);

    let (bus, seen) = collecting_bus();
    let config = project.config().no_pr(true).parallelism(4).build();
    Orchestrator::new(config, project.deps(), bus.clone(), CancellationToken::new())
        .run()
        .await
        .expect("run");
    bus.close().await;

    let events = seen.all();
    let completed_at = |unit: &str| {
        events
            .iter()
            .position(|e| e.kind == EventKind::UnitCompleted && e.unit.as_deref() == Some(unit))
            .expect("completed event")
    };
    let started_at = |unit: &str| {
        events
            .iter()
            .position(|e| e.kind == EventKind::UnitStarted && e.unit.as_deref() == Some(unit))
            .expect("started event")
    };

    assert!(completed_at("base") < started_at("mid"));
    assert!(completed_at("mid") < started_at("top"));

    // Wall-clock ordering holds too, not just stream position.
    let time_of = |i: usize| events[i].time;
    assert!(time_of(completed_at("base")) <= time_of(started_at("mid")));
}
