// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unix-socket acceptor plus HTTP/SSE server.

use crate::store::WebStore;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use choo_core::Event;
use futures_util::stream::Stream;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;

const SSE_KEEP_ALIVE: Duration = Duration::from_secs(30);
const SSE_BUFFER: usize = 1024;

/// Read orchestrator events off the web socket, one connection at a
/// time. A new connection is accepted only after the previous one
/// closes; the store's connected-count tracks the active one.
pub async fn run_socket_reader(
    listener: UnixListener,
    store: WebStore,
    events: broadcast::Sender<Event>,
    cancel: CancellationToken,
) {
    loop {
        let stream = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => stream,
                Err(e) => {
                    tracing::error!("web socket accept error: {e}");
                    continue;
                }
            },
            _ = cancel.cancelled() => return,
        };

        store.connection_opened();
        let mut reader = BufReader::new(stream).lines();
        loop {
            let line = tokio::select! {
                line = reader.next_line() => line,
                _ = cancel.cancelled() => {
                    store.connection_closed();
                    return;
                }
            };
            match line {
                Ok(Some(line)) => match serde_json::from_str::<Event>(&line) {
                    Ok(event) => {
                        store.apply(&event);
                        // No subscribers is fine; browsers come and go.
                        let _ = events.send(event);
                    }
                    Err(e) => tracing::warn!(error = %e, "unparseable event line"),
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(error = %e, "web socket read failed");
                    break;
                }
            }
        }
        store.connection_closed();
    }
}

/// Build the HTTP router: static UI, state/graph snapshots, SSE stream.
pub fn router(store: WebStore, events: broadcast::Sender<Event>, static_dir: PathBuf) -> Router {
    Router::new()
        .route(
            "/api/state",
            get({
                let store = store.clone();
                move || {
                    let store = store.clone();
                    async move { Json(store.state()) }
                }
            }),
        )
        .route(
            "/api/graph",
            get({
                let store = store.clone();
                move || {
                    let store = store.clone();
                    async move { Json(store.graph()) }
                }
            }),
        )
        .route(
            "/api/events",
            get(move || {
                let rx = events.subscribe();
                async move { sse_stream(rx).into_response() }
            }),
        )
        .fallback_service(ServeDir::new(static_dir))
}

/// SSE frames: `event: <type>\ndata: <json>\n\n`, keep-alive comment
/// every 30 seconds.
fn sse_stream(
    rx: broadcast::Receiver<Event>,
) -> Sse<impl Stream<Item = Result<SseEvent, std::convert::Infallible>>> {
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let data = match serde_json::to_string(&event) {
                        Ok(data) => data,
                        Err(_) => continue,
                    };
                    let frame = SseEvent::default().event(event.kind.to_string()).data(data);
                    return Some((Ok(frame), rx));
                }
                // A slow browser skips ahead; the next event still renders.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(SSE_KEEP_ALIVE))
}

/// Wire everything together: socket reader plus HTTP server.
pub async fn serve(
    web_socket_path: PathBuf,
    http_addr: std::net::SocketAddr,
    static_dir: PathBuf,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    // Stale socket from an unclean shutdown.
    let _ = std::fs::remove_file(&web_socket_path);
    let listener = UnixListener::bind(&web_socket_path)?;

    let store = WebStore::new();
    let (events, _) = broadcast::channel(SSE_BUFFER);

    tokio::spawn(run_socket_reader(
        listener,
        store.clone(),
        events.clone(),
        cancel.clone(),
    ));

    let app = router(store, events, static_dir);
    let http = tokio::net::TcpListener::bind(http_addr).await?;
    tracing::info!(addr = %http_addr, "web server listening");

    axum::serve(http, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
