// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

#[test]
fn builder_returns_copies() {
    let base = Event::new(EventKind::TaskStarted).unit("api");
    let derived = base.clone().task(3).payload_field("attempt", 1);

    assert_eq!(base.task, None);
    assert_eq!(derived.task, Some(3));
    assert_eq!(derived.unit.as_deref(), Some("api"));
    assert_eq!(derived.payload["attempt"], 1);
}

#[test]
fn serializes_with_dotted_type_tag() {
    let event = Event::new(EventKind::TaskValidationFail)
        .unit("core")
        .task(2)
        .error("exit status 1");

    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "task.validation.fail");
    assert_eq!(json["unit"], "core");
    assert_eq!(json["task"], 2);
    assert_eq!(json["error"], "exit status 1");
    // Empty optional fields are omitted entirely
    assert!(json.get("pr").is_none());
    assert!(json.get("payload").is_none());
}

#[test]
fn display_matches_serde_rename() {
    for kind in [
        EventKind::OrchStarted,
        EventKind::TaskClaudeInvoke,
        EventKind::TaskValidationOk,
        EventKind::CodeReviewIssuesFound,
        EventKind::PrFeedbackReceived,
        EventKind::PrMergeQueued,
        EventKind::BranchPushed,
    ] {
        let tagged = serde_json::to_value(kind).unwrap();
        assert_eq!(tagged, kind.to_string());
    }
}

#[test]
fn pr_and_payload_round_trip() {
    let event = Event::new(EventKind::PrCreated)
        .unit("web")
        .pr(42)
        .payload_field("title", "web: implement unit");

    let json = serde_json::to_string(&event).unwrap();
    let parsed: Event = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, event);
}

fn kind_strategy() -> impl Strategy<Value = EventKind> {
    prop_oneof![
        Just(EventKind::OrchStarted),
        Just(EventKind::UnitQueued),
        Just(EventKind::UnitCompleted),
        Just(EventKind::TaskStarted),
        Just(EventKind::TaskRetry),
        Just(EventKind::TaskValidationFail),
        Just(EventKind::CodeReviewFixApplied),
        Just(EventKind::PrConflict),
        Just(EventKind::PrMerged),
        Just(EventKind::WorktreeCreated),
        Just(EventKind::BranchPushed),
    ]
}

proptest! {
    #[test]
    fn any_event_round_trips(
        kind in kind_strategy(),
        unit in proptest::option::of("[a-z][a-z0-9-]{0,12}"),
        task in proptest::option::of(0u32..100),
        pr in proptest::option::of(1u64..10_000),
        error in proptest::option::of(".{0,40}"),
    ) {
        let mut event = Event::new(kind);
        if let Some(u) = unit { event = event.unit(u); }
        if let Some(t) = task { event = event.task(t); }
        if let Some(p) = pr { event = event.pr(p); }
        if let Some(e) = error { event = event.error(e); }

        let json = serde_json::to_string(&event).unwrap();
        let parsed: Event = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(parsed, event);
    }
}
