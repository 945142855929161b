// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn generated_ids_have_prefix() {
    let id = JobId::generate();
    assert!(id.as_str().starts_with("job-"));
    assert_eq!(id.suffix().len(), 12);
}

#[test]
fn generated_ids_are_unique() {
    let a = JobId::generate();
    let b = JobId::generate();
    assert_ne!(a, b);
}

#[test]
fn from_string_round_trips() {
    let id = JobId::from_string("job-abc123");
    assert_eq!(id.as_str(), "job-abc123");
    assert_eq!(id.suffix(), "abc123");
}

#[test]
fn serde_is_transparent() {
    let id = JobId::from_string("job-xyz");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"job-xyz\"");

    let parsed: JobId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn suffix_without_prefix_is_identity() {
    let id = JobId::from_string("bare");
    assert_eq!(id.suffix(), "bare");
}
