// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent-state bus handler.
//!
//! Subscribed to the event bus; applies every event to a [`RunState`]
//! and writes a compact JSON snapshot after each state-changing one.
//! The write is temp-file-then-rename so readers never observe a torn
//! snapshot.

use crate::state::RunState;
use choo_core::{Event, EventHandler};
use parking_lot::Mutex;
use std::path::PathBuf;

pub struct SnapshotWriter {
    path: PathBuf,
    state: Mutex<RunState>,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), state: Mutex::new(RunState::default()) }
    }

    /// Current state copy (deep).
    pub fn state(&self) -> RunState {
        self.state.lock().clone()
    }

    /// Load a previously written snapshot, if any.
    pub fn load(path: impl Into<PathBuf>) -> std::io::Result<RunState> {
        let content = std::fs::read_to_string(path.into())?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    fn persist(&self, state: &RunState) {
        let json = match serde_json::to_vec(state) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "cannot serialize run state");
                return;
            }
        };
        let tmp = self.path.with_extension("json.tmp");
        let result = std::fs::write(&tmp, &json).and_then(|_| std::fs::rename(&tmp, &self.path));
        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), error = %e, "snapshot write failed");
        }
    }
}

impl EventHandler for SnapshotWriter {
    fn handle(&self, event: &Event) {
        let mut state = self.state.lock();
        if state.apply(event) {
            let copy = state.clone();
            drop(state);
            self.persist(&copy);
        }
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
