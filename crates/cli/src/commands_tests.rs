// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::fs;
use tempfile::TempDir;

fn seed_complete_unit(tasks_dir: &std::path::Path, id: &str) {
    let dir = tasks_dir.join(id);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("IMPLEMENTATION_PLAN.md"),
        format!("---\nunit: {id}\norch_status: complete\norch_pr_number: 9\n---\n# {id}\n"),
    )
    .unwrap();
    fs::write(dir.join("01-t.md"), "---\ntask: 1\nstatus: complete\n---\n# T\n").unwrap();
}

#[test]
fn archive_moves_complete_units() {
    let tmp = TempDir::new().unwrap();
    let tasks = tmp.path().join("tasks");
    let completed = tmp.path().join("completed");
    seed_complete_unit(&tasks, "done");

    archive(ArchiveArgs {
        tasks_dir: tasks.clone(),
        completed_dir: completed.clone(),
        unit: None,
    })
    .unwrap();

    assert!(!tasks.join("done").exists());
    assert!(completed.join("tasks").join("done").exists());
}

#[test]
fn cleanup_reset_state_nulls_orch_keys() {
    let tmp = TempDir::new().unwrap();
    let tasks = tmp.path().join("tasks");
    seed_complete_unit(&tasks, "unit-a");

    cleanup(CleanupArgs {
        tasks_dir: tasks.clone(),
        reset_state: true,
        nuke: false,
        worktree_base: tmp.path().join("worktrees"),
    })
    .unwrap();

    let plan =
        choo_discovery::PlanFile::load(&tasks.join("unit-a").join("IMPLEMENTATION_PLAN.md"))
            .unwrap();
    assert_eq!(plan.pr_number, None);
    assert_eq!(plan.status_override, None);
}

#[test]
fn cleanup_nuke_removes_worktrees() {
    let tmp = TempDir::new().unwrap();
    let tasks = tmp.path().join("tasks");
    fs::create_dir_all(&tasks).unwrap();
    let worktrees = tmp.path().join("worktrees");
    fs::create_dir_all(worktrees.join("api")).unwrap();

    cleanup(CleanupArgs {
        tasks_dir: tasks,
        reset_state: false,
        nuke: true,
        worktree_base: worktrees.clone(),
    })
    .unwrap();

    assert!(!worktrees.exists());
}
