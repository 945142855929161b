// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-local publish/subscribe event bus.
//!
//! `emit` is non-blocking: events go into a bounded ring and a single
//! dispatcher task invokes handlers sequentially in registration order,
//! so every subscriber observes the same total order. When the ring is
//! full the oldest event is dropped and counted.
//!
//! Handlers run synchronously on the dispatcher. A handler must not call
//! `emit` on the same bus from inside `handle` in a way that depends on
//! its own dispatch completing; re-entry must go through a spawned task.

use crate::clock::{Clock, SystemClock};
use crate::event::Event;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Notify;

/// Default ring capacity.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Advisory ceiling for a single handler invocation.
const HANDLER_DEADLINE: Duration = Duration::from_millis(50);

/// Sentinel error returned by `emit` after `close`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("event bus closed")]
pub struct BusClosed;

/// Receives every event emitted on the bus.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event);
}

impl<F> EventHandler for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn handle(&self, event: &Event) {
        self(event)
    }
}

/// Handle returned by `subscribe`, usable for unsubscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Bus counters exposed for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusDiagnostics {
    /// Events discarded because the ring was full.
    pub dropped: u64,
    /// Events currently queued for dispatch.
    pub depth: usize,
    /// Registered handler count.
    pub subscribers: usize,
}

struct Inner {
    ring: Mutex<VecDeque<Event>>,
    capacity: usize,
    handlers: Mutex<Vec<(SubscriptionId, Arc<dyn EventHandler>)>>,
    notify: Notify,
    drained: Notify,
    closed: AtomicBool,
    /// True while the dispatcher is invoking handlers for an event.
    busy: AtomicBool,
    dropped: AtomicU64,
    next_sub: AtomicU64,
}

/// Process-local pub/sub with bounded fan-out.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
    now: Arc<dyn Fn() -> chrono::DateTime<chrono::Utc> + Send + Sync>,
}

impl EventBus {
    /// Create a bus with the default capacity and system clock, spawning
    /// the dispatcher task on the current tokio runtime.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_clock(capacity, SystemClock)
    }

    pub fn with_clock<C: Clock>(capacity: usize, clock: C) -> Self {
        let inner = Arc::new(Inner {
            ring: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            handlers: Mutex::new(Vec::new()),
            notify: Notify::new(),
            drained: Notify::new(),
            closed: AtomicBool::new(false),
            busy: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
            next_sub: AtomicU64::new(0),
        });

        tokio::spawn(dispatch_loop(Arc::clone(&inner)));

        Self { inner, now: Arc::new(move || clock.utc_now()) }
    }

    /// Register a handler. Handlers are invoked sequentially in
    /// registration order for each event.
    pub fn subscribe(&self, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_sub.fetch_add(1, Ordering::Relaxed));
        self.inner.handlers.lock().push((id, handler));
        id
    }

    /// Remove a previously registered handler.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.handlers.lock().retain(|(sub, _)| *sub != id);
    }

    /// Stamp the event time and enqueue it. Non-blocking: when the ring
    /// is full the oldest queued event is dropped instead.
    pub fn emit(&self, event: Event) -> Result<(), BusClosed> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(BusClosed);
        }
        let event = event.stamped((self.now)());
        {
            let mut ring = self.inner.ring.lock();
            if ring.len() >= self.inner.capacity {
                ring.pop_front();
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            }
            ring.push_back(event);
        }
        self.inner.notify.notify_one();
        Ok(())
    }

    /// Refuse further emissions and wait until the queue is drained and
    /// the dispatcher is idle.
    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.notify.notify_one();
        loop {
            // Register interest before checking so the dispatcher's
            // notify_waiters between the check and the await is not lost.
            let mut drained = std::pin::pin!(self.inner.drained.notified());
            drained.as_mut().enable();
            if self.inner.ring.lock().is_empty() && !self.inner.busy.load(Ordering::Acquire) {
                return;
            }
            drained.await;
        }
    }

    pub fn diagnostics(&self) -> BusDiagnostics {
        BusDiagnostics {
            dropped: self.inner.dropped.load(Ordering::Relaxed),
            depth: self.inner.ring.lock().len(),
            subscribers: self.inner.handlers.lock().len(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Single dispatcher: total order for all handlers.
async fn dispatch_loop(inner: Arc<Inner>) {
    loop {
        let event = {
            let mut ring = inner.ring.lock();
            let event = ring.pop_front();
            // Flip busy under the ring lock so close() never observes an
            // empty ring while an event is still being handled.
            inner.busy.store(event.is_some(), Ordering::Release);
            event
        };
        let Some(event) = event else {
            inner.drained.notify_waiters();
            if inner.closed.load(Ordering::Acquire) {
                return;
            }
            inner.notify.notified().await;
            continue;
        };

        // Snapshot so subscribe/unsubscribe never block on a running handler.
        let handlers: Vec<_> = inner.handlers.lock().clone();
        for (_, handler) in handlers {
            let started = Instant::now();
            handler.handle(&event);
            let elapsed = started.elapsed();
            if elapsed > HANDLER_DEADLINE {
                tracing::warn!(
                    event = %event.kind,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "slow event handler exceeded {}ms advisory deadline",
                    HANDLER_DEADLINE.as_millis()
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
