// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job event log with monotone sequence numbers.
//!
//! `WatchJob` clients reconnect with a `from_seq`; the log replays the
//! retained backlog and hands back a live tail so no event between the
//! two is lost.

use choo_core::{Event, EventHandler};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// One sequenced log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeqEvent {
    pub seq: u64,
    pub event: Event,
}

/// In-memory sequenced log for one job.
#[derive(Debug, Clone)]
pub struct JobEventLog {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    entries: Mutex<Vec<SeqEvent>>,
    live: broadcast::Sender<SeqEvent>,
}

impl JobEventLog {
    pub fn new() -> Self {
        let (live, _) = broadcast::channel(1024);
        Self { inner: Arc::new(Inner { entries: Mutex::new(Vec::new()), live }) }
    }

    /// Append an event; returns its sequence number (1-based).
    pub fn append(&self, event: Event) -> u64 {
        let mut entries = self.inner.entries.lock();
        let seq = entries.len() as u64 + 1;
        let entry = SeqEvent { seq, event };
        entries.push(entry.clone());
        // Send failure just means no live watcher right now.
        let _ = self.inner.live.send(entry);
        seq
    }

    /// Highest sequence number assigned so far.
    pub fn head(&self) -> u64 {
        self.inner.entries.lock().len() as u64
    }

    /// Backlog strictly after `from_seq` plus a live receiver.
    ///
    /// Subscribing under the same lock as the backlog copy guarantees
    /// the live tail starts exactly where the backlog ends.
    pub fn stream_from(&self, from_seq: u64) -> (Vec<SeqEvent>, broadcast::Receiver<SeqEvent>) {
        let entries = self.inner.entries.lock();
        let backlog =
            entries.iter().filter(|e| e.seq > from_seq).cloned().collect();
        let rx = self.inner.live.subscribe();
        (backlog, rx)
    }
}

impl Default for JobEventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for JobEventLog {
    fn handle(&self, event: &Event) {
        self.append(event.clone());
    }
}

#[cfg(test)]
#[path = "eventlog_tests.rs"]
mod tests;
