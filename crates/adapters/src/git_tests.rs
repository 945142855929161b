// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parses_worktree_list_porcelain() {
    let out = "worktree /repo\nHEAD abc123\nbranch refs/heads/main\n\nworktree /repo/.choo/worktrees/api\nHEAD def456\nbranch refs/heads/ralph/api\n\nworktree /repo/.choo/worktrees/detached\nHEAD 0123ab\ndetached\n";

    let worktrees = parse_worktree_list(out);
    assert_eq!(worktrees.len(), 3);
    assert_eq!(worktrees[0].path, PathBuf::from("/repo"));
    assert_eq!(worktrees[0].branch.as_deref(), Some("main"));
    assert_eq!(worktrees[1].branch.as_deref(), Some("ralph/api"));
    assert_eq!(worktrees[2].branch, None);
}

#[test]
fn parses_empty_worktree_list() {
    assert!(parse_worktree_list("").is_empty());
}

#[tokio::test]
async fn command_failure_carries_stderr() {
    // `git -C <tmp> status` outside a repository fails with a message.
    let tmp = tempfile::TempDir::new().unwrap();
    let git = SystemGit::new();
    let err = git.changed_files(tmp.path()).await.unwrap_err();
    match err {
        VcsError::Command { op, detail } => {
            assert_eq!(op, "status");
            assert!(!detail.is_empty());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
