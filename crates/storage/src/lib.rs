// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! choo-storage: materialized run state and the per-job event log.

pub mod eventlog;
pub mod snapshot;
pub mod state;

pub use eventlog::{JobEventLog, SeqEvent};
pub use snapshot::SnapshotWriter;
pub use state::{RunState, TaskState, UnitState};
