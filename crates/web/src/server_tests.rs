// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use choo_core::EventKind;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UnixStream};

#[tokio::test]
async fn socket_reader_applies_events_and_broadcasts() {
    let tmp = TempDir::new().unwrap();
    let socket = tmp.path().join("web.sock");
    let listener = UnixListener::bind(&socket).unwrap();

    let store = WebStore::new();
    let (events, mut rx) = broadcast::channel(16);
    let cancel = CancellationToken::new();
    tokio::spawn(run_socket_reader(listener, store.clone(), events, cancel.clone()));

    let mut client = UnixStream::connect(&socket).await.unwrap();
    let event = Event::new(EventKind::UnitStarted).unit("api");
    let mut line = serde_json::to_string(&event).unwrap();
    line.push('\n');
    client.write_all(line.as_bytes()).await.unwrap();

    let received = tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received.kind, EventKind::UnitStarted);
    assert_eq!(store.state().units["api"].status, choo_core::UnitStatus::InProgress);
    assert_eq!(store.connected(), 1);

    drop(client);
    // Connected count falls once the reader notices the close.
    for _ in 0..100 {
        if store.connected() == 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(store.connected(), 0);
    cancel.cancel();
}

async fn http_get(addr: std::net::SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

async fn spawn_http(store: WebStore, events: broadcast::Sender<Event>, static_dir: std::path::PathBuf) -> std::net::SocketAddr {
    let app = router(store, events, static_dir);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

#[tokio::test]
async fn state_and_graph_endpoints_serve_json() {
    let tmp = TempDir::new().unwrap();
    let store = WebStore::new();
    store.apply(
        &Event::new(EventKind::OrchStarted)
            .payload_field("layers", serde_json::json!([["core"]])),
    );
    store.apply(&Event::new(EventKind::UnitStarted).unit("core"));

    let (events, _keep) = broadcast::channel(16);
    let addr = spawn_http(store, events, tmp.path().to_path_buf()).await;

    let state = http_get(addr, "/api/state").await;
    assert!(state.starts_with("HTTP/1.1 200"));
    assert!(state.contains("\"running\""));

    let graph = http_get(addr, "/api/graph").await;
    assert!(graph.contains("\"layers\":[[\"core\"]]"));
    assert!(graph.contains("\"in_progress\""));
}

#[tokio::test]
async fn static_files_are_served_from_the_ui_dir() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("index.html"), "<html>choo</html>").unwrap();

    let (events, _keep) = broadcast::channel(16);
    let addr = spawn_http(WebStore::new(), events, tmp.path().to_path_buf()).await;

    let response = http_get(addr, "/").await;
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("<html>choo</html>"));
}

#[tokio::test]
async fn sse_stream_frames_events_by_type() {
    let tmp = TempDir::new().unwrap();
    let (events, _keep) = broadcast::channel(16);
    let addr = spawn_http(WebStore::new(), events.clone(), tmp.path().to_path_buf()).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /api/events HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    // Give the subscription a moment, then publish.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    events.send(Event::new(EventKind::UnitCompleted).unit("api")).unwrap();

    let mut collected = String::new();
    let mut buf = [0u8; 4096];
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        let n = tokio::select! {
            read = stream.read(&mut buf) => read.unwrap(),
            _ = tokio::time::sleep_until(deadline) => break,
        };
        if n == 0 {
            break;
        }
        collected.push_str(&String::from_utf8_lossy(&buf[..n]));
        if collected.contains("event: unit.completed") {
            break;
        }
    }

    assert!(collected.contains("text/event-stream"));
    assert!(collected.contains("event: unit.completed"));
    assert!(collected.contains("data: {"));
}
