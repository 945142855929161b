// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `choo archive` specs.

use crate::prelude::*;

#[test]
fn archive_with_missing_dir_fails_cleanly() {
    let tmp = tempfile::TempDir::new().expect("tempdir");
    cli()
        .current_dir(tmp.path())
        .args(&["archive", "--tasks-dir", "does-not-exist"])
        .fails_with(1);
}

#[test]
fn archive_moves_complete_units() {
    let tmp = tempfile::TempDir::new().expect("tempdir");
    let unit_dir = tmp.path().join("specs").join("tasks").join("done");
    std::fs::create_dir_all(&unit_dir).expect("unit dir");
    std::fs::write(
        unit_dir.join("IMPLEMENTATION_PLAN.md"),
        "---\nunit: done\norch_status: complete\n---\n# done\n",
    )
    .expect("plan");
    std::fs::write(unit_dir.join("01-t.md"), "---\ntask: 1\nstatus: complete\n---\n# T\n")
        .expect("task");

    cli()
        .current_dir(tmp.path())
        .args(&["archive"])
        .passes()
        .stdout_has("archived done");

    assert!(!unit_dir.exists());
    assert!(tmp.path().join("specs").join("completed").join("tasks").join("done").exists());
}
