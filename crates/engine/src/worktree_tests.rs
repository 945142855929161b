// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use choo_adapters::FakeGit;
use std::sync::Arc;
use tempfile::TempDir;

fn manager(tmp: &TempDir) -> (WorktreeManager, FakeGit) {
    let git = FakeGit::new();
    let mgr = WorktreeManager::new(
        Arc::new(git.clone()),
        tmp.path(),
        tmp.path().join("worktrees"),
        "ralph/",
    );
    (mgr, git)
}

#[tokio::test]
async fn create_registers_branch_and_path() {
    let tmp = TempDir::new().unwrap();
    let (mgr, git) = manager(&tmp);

    let wt = mgr.create("api", "main").await.unwrap();
    assert_eq!(wt.branch, "ralph/api");
    assert!(wt.path.ends_with("worktrees/api"));
    assert!(wt.path.is_dir());
    assert_eq!(git.branch_of(&wt.path).as_deref(), Some("ralph/api"));

    assert_eq!(mgr.get("api"), Some(wt));
}

#[tokio::test]
async fn second_create_for_same_unit_fails() {
    let tmp = TempDir::new().unwrap();
    let (mgr, _git) = manager(&tmp);

    mgr.create("api", "main").await.unwrap();
    let err = mgr.create("api", "main").await.unwrap_err();
    assert!(matches!(err, WorktreeError::AlreadyExists { .. }));
}

#[tokio::test]
async fn list_is_sorted_by_unit() {
    let tmp = TempDir::new().unwrap();
    let (mgr, _git) = manager(&tmp);

    mgr.create("web", "main").await.unwrap();
    mgr.create("api", "main").await.unwrap();

    let ids: Vec<String> = mgr.list().into_iter().map(|w| w.unit_id).collect();
    assert_eq!(ids, vec!["api", "web"]);
}

#[tokio::test]
async fn remove_refuses_dirty_without_force() {
    let tmp = TempDir::new().unwrap();
    let (mgr, _git) = manager(&tmp);

    let wt = mgr.create("api", "main").await.unwrap();
    std::fs::write(wt.path.join("uncommitted.txt"), "wip").unwrap();
    assert!(mgr.has_uncommitted_changes("api").await.unwrap());

    let err = mgr.remove("api", false).await.unwrap_err();
    assert!(matches!(err, WorktreeError::Dirty { .. }));
    assert!(mgr.get("api").is_some());

    mgr.remove("api", true).await.unwrap();
    assert!(mgr.get("api").is_none());
    assert!(!wt.path.exists());
}

#[tokio::test]
async fn remove_clean_worktree_without_force() {
    let tmp = TempDir::new().unwrap();
    let (mgr, _git) = manager(&tmp);

    mgr.create("api", "main").await.unwrap();
    mgr.remove("api", false).await.unwrap();
    assert!(mgr.get("api").is_none());
}

#[tokio::test]
async fn missing_worktree_reports_not_found() {
    let tmp = TempDir::new().unwrap();
    let (mgr, _git) = manager(&tmp);

    let err = mgr.remove("ghost", false).await.unwrap_err();
    assert!(matches!(err, WorktreeError::NotFound { .. }));
}
