// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{TaskBuilder, UnitBuilder};
use yare::parameterized;

#[parameterized(
    all_complete = { &[TaskStatus::Complete, TaskStatus::Complete], UnitStatus::Complete },
    some_complete = { &[TaskStatus::Complete, TaskStatus::Pending], UnitStatus::InProgress },
    one_running = { &[TaskStatus::InProgress, TaskStatus::Pending], UnitStatus::InProgress },
    untouched = { &[TaskStatus::Pending, TaskStatus::Pending], UnitStatus::Pending },
)]
fn derived_status(statuses: &[TaskStatus], expected: UnitStatus) {
    let tasks: Vec<Task> = statuses
        .iter()
        .enumerate()
        .map(|(i, s)| TaskBuilder::new(i as u32 + 1).status(*s).build())
        .collect();
    assert_eq!(Unit::derived_status(&tasks), expected);
}

#[test]
fn derived_status_of_empty_task_list_is_pending() {
    assert_eq!(Unit::derived_status(&[]), UnitStatus::Pending);
}

#[test]
fn next_ready_task_respects_intra_unit_deps() {
    let unit = UnitBuilder::new("api")
        .task(TaskBuilder::new(1).status(TaskStatus::Complete))
        .task(TaskBuilder::new(2).depends_on([1]))
        .task(TaskBuilder::new(3).depends_on([2]))
        .build();

    assert_eq!(unit.next_ready_task().map(|t| t.number), Some(2));
}

#[test]
fn next_ready_task_prefers_lowest_number() {
    let unit = UnitBuilder::new("api")
        .task(TaskBuilder::new(1))
        .task(TaskBuilder::new(2))
        .build();

    assert_eq!(unit.next_ready_task().map(|t| t.number), Some(1));
}

#[test]
fn next_ready_task_none_when_dep_failed() {
    let unit = UnitBuilder::new("api")
        .task(TaskBuilder::new(1).status(TaskStatus::Failed))
        .task(TaskBuilder::new(2).depends_on([1]))
        .build();

    assert_eq!(unit.next_ready_task(), None);
}

#[test]
fn status_string_round_trip() {
    for status in
        [UnitStatus::Pending, UnitStatus::InProgress, UnitStatus::Complete, UnitStatus::Failed, UnitStatus::Blocked]
    {
        let parsed: UnitStatus = status.to_string().parse().unwrap();
        assert_eq!(parsed, status);
    }
    for status in
        [TaskStatus::Pending, TaskStatus::InProgress, TaskStatus::Complete, TaskStatus::Failed]
    {
        let parsed: TaskStatus = status.to_string().parse().unwrap();
        assert_eq!(parsed, status);
    }
}

#[test]
fn terminal_statuses() {
    assert!(UnitStatus::Complete.is_terminal());
    assert!(UnitStatus::Failed.is_terminal());
    assert!(UnitStatus::Blocked.is_terminal());
    assert!(!UnitStatus::Pending.is_terminal());
    assert!(!UnitStatus::InProgress.is_terminal());
}
