// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event pusher: bus subscriber → Unix socket writer.
//!
//! Observers are best-effort: a full buffer or a dead socket drops
//! events rather than slowing the orchestrator. The writer reconnects
//! with exponential backoff (100 ms doubling to a 5 s cap).

use choo_core::{Event, EventHandler};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const WRITE_TIMEOUT: Duration = Duration::from_secs(5);
const BACKOFF_START: Duration = Duration::from_millis(100);
const BACKOFF_CAP: Duration = Duration::from_secs(5);
const BUFFER: usize = 256;

/// Bus handler feeding the writer task.
pub struct WebPusher {
    tx: mpsc::Sender<Event>,
}

impl WebPusher {
    /// Spawn the writer task targeting `socket_path`; returns the bus
    /// handler. The task exits on cancellation.
    pub fn spawn(socket_path: impl Into<PathBuf>, cancel: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(BUFFER);
        tokio::spawn(writer_loop(socket_path.into(), rx, cancel));
        Self { tx }
    }
}

impl EventHandler for WebPusher {
    fn handle(&self, event: &Event) {
        // try_send: never block the bus dispatcher; drop when full.
        if self.tx.try_send(event.clone()).is_err() {
            tracing::trace!("web pusher buffer full; dropping event");
        }
    }
}

async fn writer_loop(
    socket_path: PathBuf,
    mut rx: mpsc::Receiver<Event>,
    cancel: CancellationToken,
) {
    let mut backoff = BACKOFF_START;
    let mut stream: Option<UnixStream> = None;

    loop {
        let event = tokio::select! {
            event = rx.recv() => match event {
                Some(event) => event,
                None => return,
            },
            _ = cancel.cancelled() => return,
        };

        let line = match serde_json::to_string(&event) {
            Ok(mut line) => {
                line.push('\n');
                line
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot serialize event for pusher");
                continue;
            }
        };

        // Connect lazily; losses while disconnected are acceptable.
        if stream.is_none() {
            match UnixStream::connect(&socket_path).await {
                Ok(connected) => {
                    stream = Some(connected);
                    backoff = BACKOFF_START;
                }
                Err(_) => {
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = cancel.cancelled() => return,
                    }
                    backoff = (backoff * 2).min(BACKOFF_CAP);
                    continue;
                }
            }
        }

        if let Some(active) = stream.as_mut() {
            let write = tokio::time::timeout(WRITE_TIMEOUT, active.write_all(line.as_bytes()));
            match write.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!(error = %e, "web socket write failed; reconnecting");
                    stream = None;
                }
                Err(_) => {
                    tracing::debug!("web socket write timed out; reconnecting");
                    stream = None;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "pusher_tests.rs"]
mod tests;
