// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-size worker pool.
//!
//! The pool never queues: a submit while full returns [`AtCapacity`] and
//! the scheduler keeps the backlog. Each accepted worker runs as its own
//! tokio task and reports its terminal outcome over a channel.

use crate::worker::{Worker, WorkerOutcome};
use thiserror::Error;
use tokio::sync::mpsc;

/// Signal returned when every slot is occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("worker pool at capacity")]
pub struct AtCapacity;

pub struct WorkerPool {
    parallelism: usize,
    active: usize,
    completions_tx: mpsc::UnboundedSender<(String, WorkerOutcome)>,
    completions_rx: mpsc::UnboundedReceiver<(String, WorkerOutcome)>,
}

impl WorkerPool {
    pub fn new(parallelism: usize) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self { parallelism: parallelism.max(1), active: 0, completions_tx, completions_rx }
    }

    pub fn has_capacity(&self) -> bool {
        self.active < self.parallelism
    }

    pub fn active(&self) -> usize {
        self.active
    }

    /// Spawn the worker if a slot is free.
    pub fn try_submit(&mut self, worker: Worker) -> Result<(), AtCapacity> {
        if !self.has_capacity() {
            return Err(AtCapacity);
        }
        self.active += 1;

        let unit_id = worker.unit_id().to_string();
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let outcome = worker.run().await;
            // The receiver lives as long as the pool; a send failure
            // means the run was torn down and the outcome is moot.
            let _ = tx.send((unit_id, outcome));
        });
        Ok(())
    }

    /// Wait for the next worker to finish. Returns `None` when no
    /// workers are active.
    pub async fn next_completion(&mut self) -> Option<(String, WorkerOutcome)> {
        if self.active == 0 {
            return None;
        }
        let done = self.completions_rx.recv().await;
        if done.is_some() {
            self.active -= 1;
        }
        done
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
