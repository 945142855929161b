// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queryable state behind the HTTP endpoints.

use choo_core::{Event, EventKind};
use choo_storage::RunState;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Layered DAG for the visualization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GraphView {
    /// Level 0 first; ids sorted within a level.
    pub layers: Vec<Vec<String>>,
    /// Current status per unit id.
    pub units: BTreeMap<String, choo_core::UnitStatus>,
}

#[derive(Default)]
struct StoreState {
    connected: usize,
    run: RunState,
    layers: Vec<Vec<String>>,
}

/// Shared store; writes guarded by a reader-writer lock, snapshots deep-
/// copied on read.
#[derive(Clone, Default)]
pub struct WebStore {
    inner: Arc<RwLock<StoreState>>,
}

impl WebStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event from the orchestrator socket.
    pub fn apply(&self, event: &Event) {
        let mut state = self.inner.write();
        if event.kind == EventKind::OrchStarted {
            if let Some(layers) = event.payload.get("layers") {
                if let Ok(layers) = serde_json::from_value(layers.clone()) {
                    state.layers = layers;
                }
            }
        }
        state.run.apply(event);
    }

    pub fn connected(&self) -> usize {
        self.inner.read().connected
    }

    pub fn connection_opened(&self) {
        self.inner.write().connected += 1;
    }

    pub fn connection_closed(&self) {
        let mut state = self.inner.write();
        state.connected = state.connected.saturating_sub(1);
    }

    /// Deep-copied run state.
    pub fn state(&self) -> RunState {
        self.inner.read().run.clone()
    }

    /// Deep-copied layered graph with live statuses.
    pub fn graph(&self) -> GraphView {
        let state = self.inner.read();
        GraphView {
            layers: state.layers.clone(),
            units: state.run.units.iter().map(|(id, u)| (id.clone(), u.status)).collect(),
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
