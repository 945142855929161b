// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use parking_lot::Mutex;
use std::sync::Arc;

fn sink() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) + Send + Sync) {
    let lines: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let writer = Arc::clone(&lines);
    (lines, move |line: &str| writer.lock().push(line.to_string()))
}

#[tokio::test]
async fn streams_stdout_lines_to_sink() {
    let tmp = tempfile::TempDir::new().unwrap();
    // `cat` echoes the prompt back, one line at a time.
    let provider = CommandProvider::new(ProviderType::new("cat"), "cat", Duration::from_secs(5));
    let (out_lines, out) = sink();
    let (_err_lines, err) = sink();

    provider.invoke("line one\nline two", tmp.path(), &out, &err).await.unwrap();

    assert_eq!(*out_lines.lock(), vec!["line one", "line two"]);
}

#[tokio::test]
async fn empty_program_is_a_config_error() {
    let tmp = tempfile::TempDir::new().unwrap();
    let provider = CommandProvider::new(ProviderType::new("none"), "", Duration::from_secs(1));
    let (_, out) = sink();
    let (_, err) = sink();

    let result = provider.invoke("x", tmp.path(), &out, &err).await;
    assert!(matches!(result, Err(ProviderError::Config(_))));
}

#[tokio::test]
async fn missing_workdir_is_a_config_error() {
    let provider = CommandProvider::new(ProviderType::new("cat"), "cat", Duration::from_secs(1));
    let (_, out) = sink();
    let (_, err) = sink();

    let result = provider.invoke("x", Path::new("/nonexistent-choo-dir"), &out, &err).await;
    assert!(matches!(result, Err(ProviderError::Config(_))));
}

#[tokio::test]
async fn slow_provider_times_out() {
    let tmp = tempfile::TempDir::new().unwrap();
    let provider = CommandProvider::new(ProviderType::new("sleep"), "sleep", Duration::from_millis(100))
        .arg("30");
    let (_, out) = sink();
    let (_, err) = sink();

    let started = std::time::Instant::now();
    let result = provider.invoke("", tmp.path(), &out, &err).await;
    assert!(matches!(result, Err(ProviderError::Timeout(_))));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn nonzero_exit_is_an_invocation_error() {
    let tmp = tempfile::TempDir::new().unwrap();
    let provider = CommandProvider::new(ProviderType::new("false"), "false", Duration::from_secs(5));
    let (_, out) = sink();
    let (_, err) = sink();

    let result = provider.invoke("", tmp.path(), &out, &err).await;
    assert!(matches!(result, Err(ProviderError::Invocation(_))));
}

#[tokio::test]
async fn fake_provider_records_calls() {
    let tmp = tempfile::TempDir::new().unwrap();
    let provider = crate::fake::FakeProvider::writing_file("edit.txt");
    let (_, out) = sink();
    let (_, err) = sink();

    provider.invoke("do the work", tmp.path(), &out, &err).await.unwrap();

    let calls = provider.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].prompt, "do the work");
    assert!(tmp.path().join("edit.txt").exists());
}
