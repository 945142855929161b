// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{seed_unit, EngineFixture};
use choo_adapters::{FakeProvider, ReviewState};
use choo_discovery::{discover, PlanFile, TaskFile};

fn discovered_unit(f: &EngineFixture, id: &str) -> Unit {
    discover(&f.tasks_dir())
        .unwrap()
        .into_iter()
        .find(|u| u.id == id)
        .unwrap()
}

async fn run_worker(f: &EngineFixture, config: choo_core::RunConfig, id: &str) -> WorkerOutcome {
    let unit = discovered_unit(f, id);
    let worker = Worker::new(f.worker_ctx(config), unit, CancellationToken::new());
    let outcome = worker.run().await;
    f.bus.close().await;
    outcome
}

#[tokio::test]
async fn unit_completes_through_the_full_lifecycle() {
    let f = EngineFixture::with_provider(FakeProvider::writing_file("impl.rs"));
    seed_unit(&f.tasks_dir(), "api", &[], &[(1, "exit 0"), (2, "exit 0")]);

    let outcome = run_worker(&f, f.config().build(), "api").await;
    assert_eq!(outcome, WorkerOutcome::Complete);

    let kinds = f.kinds();
    let expected_prefix = [
        EventKind::UnitStarted,
        EventKind::WorktreeCreated,
        EventKind::TaskStarted,
    ];
    assert_eq!(&kinds[..3], &expected_prefix);
    assert!(kinds.contains(&EventKind::TaskCommitted));
    assert!(kinds.contains(&EventKind::CodeReviewStarted));
    assert!(kinds.contains(&EventKind::BranchPushed));
    assert!(kinds.contains(&EventKind::PrCreated));
    assert!(kinds.contains(&EventKind::PrMerged));
    assert!(kinds.contains(&EventKind::WorktreeRemoved));
    assert_eq!(kinds.last(), Some(&EventKind::UnitCompleted));

    // Deterministic commit messages, one per task.
    let wt_path = f.tmp.path().join("worktrees").join("api");
    assert_eq!(
        f.git.commits(&wt_path),
        vec!["task 1: Task 1 of api".to_string(), "task 2: Task 2 of api".to_string()]
    );
}

#[tokio::test]
async fn plan_records_pr_number_and_completion() {
    let f = EngineFixture::new();
    seed_unit(&f.tasks_dir(), "api", &[], &[(1, "exit 0")]);

    run_worker(&f, f.config().build(), "api").await;

    let plan = PlanFile::load(&f.tasks_dir().join("api").join("IMPLEMENTATION_PLAN.md")).unwrap();
    assert_eq!(plan.pr_number, Some(100));
    assert_eq!(plan.status_override, Some(UnitStatus::Complete));
    assert!(plan.started_at.is_some());
    assert!(plan.completed_at.is_some());
    assert_eq!(plan.branch.as_deref(), Some("ralph/api"));
}

#[tokio::test]
async fn task_statuses_are_written_back() {
    let f = EngineFixture::new();
    seed_unit(&f.tasks_dir(), "api", &[], &[(1, "exit 0")]);

    run_worker(&f, f.config().build(), "api").await;

    let task = TaskFile::load(&f.tasks_dir().join("api").join("01-task.md")).unwrap();
    assert_eq!(task.task.status, TaskStatus::Complete);
}

#[tokio::test]
async fn no_pr_mode_skips_the_pr_lifecycle() {
    let f = EngineFixture::new();
    seed_unit(&f.tasks_dir(), "api", &[], &[(1, "exit 0")]);

    let outcome = run_worker(&f, f.config().no_pr(true).build(), "api").await;
    assert_eq!(outcome, WorkerOutcome::Complete);

    let kinds = f.kinds();
    assert!(!kinds.contains(&EventKind::BranchPushed));
    assert!(!kinds.contains(&EventKind::PrCreated));
    assert!(!kinds.contains(&EventKind::PrMerged));
    assert!(f.forge.opened_prs().is_empty());
}

#[tokio::test]
async fn failed_task_fails_the_unit_and_keeps_the_worktree() {
    let f = EngineFixture::new();
    seed_unit(&f.tasks_dir(), "api", &[], &[(1, "exit 1")]);

    let outcome = run_worker(&f, f.config().max_retries(1).build(), "api").await;
    assert!(matches!(outcome, WorkerOutcome::Failed(_)));

    let kinds = f.kinds();
    assert!(kinds.contains(&EventKind::TaskFailed));
    assert_eq!(kinds.last(), Some(&EventKind::UnitFailed));
    assert!(!kinds.contains(&EventKind::PrCreated));

    // Worktree retained for inspection.
    assert!(f.tmp.path().join("worktrees").join("api").exists());

    let task = TaskFile::load(&f.tasks_dir().join("api").join("01-task.md")).unwrap();
    assert_eq!(task.task.status, TaskStatus::Failed);
    let plan = PlanFile::load(&f.tasks_dir().join("api").join("IMPLEMENTATION_PLAN.md")).unwrap();
    assert_eq!(plan.status_override, Some(UnitStatus::Failed));
}

#[tokio::test]
async fn changes_requested_triggers_feedback_round_then_merge() {
    let f = EngineFixture::with_provider(FakeProvider::writing_file("impl.rs"));
    seed_unit(&f.tasks_dir(), "api", &[], &[(1, "exit 0")]);
    f.forge.enqueue_review_state(ReviewState::ChangesRequested {
        feedback: "please add tests".to_string(),
    });
    // Next poll approves.

    let outcome = run_worker(&f, f.config().build(), "api").await;
    assert_eq!(outcome, WorkerOutcome::Complete);

    let kinds = f.kinds();
    let feedback_received =
        kinds.iter().position(|k| *k == EventKind::PrFeedbackReceived).unwrap();
    let feedback_addressed =
        kinds.iter().position(|k| *k == EventKind::PrFeedbackAddressed).unwrap();
    let merged = kinds.iter().position(|k| *k == EventKind::PrMerged).unwrap();
    assert!(feedback_received < feedback_addressed);
    assert!(feedback_addressed < merged);

    // The feedback round pushed the branch a second time.
    assert_eq!(f.git.pushed_branches().len(), 2);
    // The provider saw the reviewer's comments.
    let prompts: Vec<String> =
        f.provider.calls().into_iter().map(|c| c.prompt).collect();
    assert!(prompts.iter().any(|p| p.contains("please add tests")));
}

#[tokio::test]
async fn skip_review_merges_without_polling() {
    let f = EngineFixture::new();
    seed_unit(&f.tasks_dir(), "api", &[], &[(1, "exit 0")]);
    // A queued changes-request would block a polling run; skip_review
    // must never observe it.
    f.forge.enqueue_review_state(ReviewState::ChangesRequested {
        feedback: "ignored".to_string(),
    });

    let outcome = run_worker(&f, f.config().skip_review(true).build(), "api").await;
    assert_eq!(outcome, WorkerOutcome::Complete);

    let kinds = f.kinds();
    assert!(kinds.contains(&EventKind::PrMerged));
    assert!(!kinds.contains(&EventKind::PrFeedbackReceived));
}

#[tokio::test]
async fn unit_with_already_complete_tasks_skips_straight_to_pr() {
    let f = EngineFixture::new();
    let dir = f.tasks_dir().join("api");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("IMPLEMENTATION_PLAN.md"), "---\nunit: api\n---\n# api\n").unwrap();
    std::fs::write(
        dir.join("01-task.md"),
        "---\ntask: 1\nstatus: complete\nbackpressure: exit 0\n---\n# Done already\n",
    )
    .unwrap();

    // Discovery marks the unit complete; the worker still runs it when
    // asked (resume path) and finds no ready tasks.
    let outcome = run_worker(&f, f.config().build(), "api").await;
    assert_eq!(outcome, WorkerOutcome::Complete);

    let kinds = f.kinds();
    assert!(!kinds.contains(&EventKind::TaskStarted));
    assert!(kinds.contains(&EventKind::PrMerged));
}
