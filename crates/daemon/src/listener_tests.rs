// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::jobs::JobManager;
use crate::jobs::tests::{fake_deps, params, seed_unit};
use choo_wire::{ListJobsParams, Request, StopJobParams};
use tempfile::TempDir;
use tokio::io::{duplex, AsyncWriteExt, BufReader};

struct Client {
    reader: BufReader<tokio::io::ReadHalf<tokio::io::DuplexStream>>,
    writer: tokio::io::WriteHalf<tokio::io::DuplexStream>,
    next_id: u64,
}

impl Client {
    fn connect(ctx: Arc<ListenCtx>) -> Self {
        let (client, server) = duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server);
        tokio::spawn(async move {
            let _ = handle_connection(server_read, server_write, &ctx).await;
        });
        let (client_read, client_write) = tokio::io::split(client);
        Self { reader: BufReader::new(client_read), writer: client_write, next_id: 0 }
    }

    async fn call(&mut self, method: Method) -> Response {
        self.next_id += 1;
        choo_wire::write_frame(&mut self.writer, &Request { id: self.next_id, method })
            .await
            .unwrap();
        choo_wire::read_frame(&mut self.reader).await.unwrap()
    }

    async fn next_response(&mut self) -> Response {
        choo_wire::read_frame(&mut self.reader).await.unwrap()
    }
}

fn ctx() -> (Arc<ListenCtx>, TempDir) {
    let tmp = TempDir::new().unwrap();
    let jobs = Arc::new(JobManager::new(tmp.path().join("jobs"), fake_deps()));
    (Arc::new(ListenCtx { jobs, shutdown: Arc::new(Notify::new()) }), tmp)
}

#[tokio::test]
async fn health_reports_version_and_active_jobs() {
    let (ctx, _tmp) = ctx();
    let mut client = Client::connect(Arc::clone(&ctx));

    let response = client.call(Method::Health).await;
    match response.body {
        ResponseBody::Health { healthy, active_jobs, version } => {
            assert!(healthy);
            assert_eq!(active_jobs, 0);
            assert_eq!(version, crate::VERSION);
        }
        other => panic!("unexpected body: {other:?}"),
    }
}

#[tokio::test]
async fn start_then_list_then_watch() {
    let (ctx, tmp) = ctx();
    let tasks = tmp.path().join("specs").join("tasks");
    seed_unit(&tasks, "api", "exit 0");

    let mut client = Client::connect(Arc::clone(&ctx));

    let job_id = match client.call(Method::StartJob(params(&tasks))).await.body {
        ResponseBody::JobStarted { job_id } => job_id,
        other => panic!("unexpected body: {other:?}"),
    };

    let jobs = match client.call(Method::ListJobs(ListJobsParams::default())).await.body {
        ResponseBody::Jobs { jobs } => jobs,
        other => panic!("unexpected body: {other:?}"),
    };
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_id, job_id);

    // Watch from the start: sequence numbers are contiguous from 1 and
    // the stream ends when the job goes terminal.
    let mut watcher = Client::connect(Arc::clone(&ctx));
    let first = watcher
        .call(Method::WatchJob(choo_wire::WatchJobParams {
            job_id: job_id.as_str().to_string(),
            from_seq: 0,
        }))
        .await;

    let mut seqs = Vec::new();
    let mut response = first;
    loop {
        match response.body {
            ResponseBody::WatchEvent { seq, .. } => seqs.push(seq),
            ResponseBody::WatchEnd { last_seq } => {
                assert_eq!(last_seq, *seqs.last().unwrap());
                break;
            }
            other => panic!("unexpected body: {other:?}"),
        }
        response = watcher.next_response().await;
    }
    assert_eq!(seqs, (1..=seqs.len() as u64).collect::<Vec<_>>());
}

#[tokio::test]
async fn watch_from_seq_skips_replayed_events() {
    let (ctx, tmp) = ctx();
    let tasks = tmp.path().join("specs").join("tasks");
    seed_unit(&tasks, "api", "exit 0");

    let mut client = Client::connect(Arc::clone(&ctx));
    let job_id = match client.call(Method::StartJob(params(&tasks))).await.body {
        ResponseBody::JobStarted { job_id } => job_id,
        other => panic!("unexpected body: {other:?}"),
    };

    // Wait for the job to finish so the backlog is complete.
    let job = ctx.jobs.get(job_id.as_str()).unwrap();
    for _ in 0..200 {
        if job.status().is_terminal() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    let mut watcher = Client::connect(Arc::clone(&ctx));
    let mut response = watcher
        .call(Method::WatchJob(choo_wire::WatchJobParams {
            job_id: job_id.as_str().to_string(),
            from_seq: 2,
        }))
        .await;

    let mut first_seq = None;
    loop {
        match response.body {
            ResponseBody::WatchEvent { seq, .. } => {
                first_seq.get_or_insert(seq);
            }
            ResponseBody::WatchEnd { .. } => break,
            other => panic!("unexpected body: {other:?}"),
        }
        response = watcher.next_response().await;
    }
    assert_eq!(first_seq, Some(3));
}

#[tokio::test]
async fn unknown_job_watch_errors() {
    let (ctx, _tmp) = ctx();
    let mut client = Client::connect(Arc::clone(&ctx));

    let response = client
        .call(Method::WatchJob(choo_wire::WatchJobParams {
            job_id: "job-ghost".to_string(),
            from_seq: 0,
        }))
        .await;
    assert!(matches!(response.body, ResponseBody::Error { .. }));
}

#[tokio::test]
async fn stop_job_acknowledges() {
    let (ctx, tmp) = ctx();
    let tasks = tmp.path().join("specs").join("tasks");
    seed_unit(&tasks, "api", "sleep 30");

    let mut client = Client::connect(Arc::clone(&ctx));
    let job_id = match client.call(Method::StartJob(params(&tasks))).await.body {
        ResponseBody::JobStarted { job_id } => job_id,
        other => panic!("unexpected body: {other:?}"),
    };

    let response = client
        .call(Method::StopJob(StopJobParams { job_id: job_id.as_str().to_string(), force: true }))
        .await;
    assert!(matches!(response.body, ResponseBody::Ok { ok: true }));
}

#[tokio::test]
async fn duplicate_tasks_dir_start_is_an_error_response() {
    let (ctx, tmp) = ctx();
    let tasks = tmp.path().join("specs").join("tasks");
    seed_unit(&tasks, "api", "sleep 5");

    let mut client = Client::connect(Arc::clone(&ctx));
    let first = client.call(Method::StartJob(params(&tasks))).await;
    assert!(matches!(first.body, ResponseBody::JobStarted { .. }));

    let second = client.call(Method::StartJob(params(&tasks))).await;
    match second.body {
        ResponseBody::Error { message } => assert!(message.contains("already")),
        other => panic!("unexpected body: {other:?}"),
    }
    ctx.jobs.cancel_all(true);
}

#[tokio::test]
async fn shutdown_notifies_and_acknowledges() {
    let (ctx, _tmp) = ctx();

    let mut client = Client::connect(Arc::clone(&ctx));
    let response = client
        .call(Method::Shutdown(choo_wire::ShutdownParams {
            wait_for_jobs: false,
            timeout_sec: Some(1),
        }))
        .await;
    assert!(matches!(response.body, ResponseBody::Ok { ok: true }));

    // notify_one stored a permit, so a late waiter still wakes.
    tokio::time::timeout(std::time::Duration::from_secs(1), ctx.shutdown.notified())
        .await
        .unwrap();
}
