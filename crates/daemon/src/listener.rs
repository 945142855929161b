// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! Accepts connections on the daemon's Unix socket and handles each on
//! its own task, so a slow client never blocks the job manager. A
//! connection may issue several requests; `WatchJob` turns it into an
//! event stream until the job goes terminal or the client disconnects.

use crate::jobs::{JobManager, JOB_RETENTION};
use crate::VERSION;
use choo_wire::{
    read_frame, write_frame, Method, ProtocolError, Request, Response, ResponseBody,
    ShutdownParams, WatchJobParams,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, BufReader};
use tokio::net::UnixListener;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

/// Shared daemon context for all request handlers.
pub struct ListenCtx {
    pub jobs: Arc<JobManager>,
    pub shutdown: Arc<Notify>,
}

/// Accept loop. Runs until the task is dropped at shutdown.
pub async fn run_listener(listener: UnixListener, ctx: Arc<ListenCtx>) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    let (reader, writer) = stream.into_split();
                    if let Err(e) = handle_connection(reader, writer, &ctx).await {
                        log_connection_error(e);
                    }
                });
            }
            Err(e) => error!("accept error: {e}"),
        }
    }
}

fn log_connection_error(e: ProtocolError) {
    match e {
        ProtocolError::ConnectionClosed => debug!("client disconnected"),
        ProtocolError::Timeout => warn!("connection timeout"),
        other => error!("connection error: {other}"),
    }
}

async fn handle_connection<R, W>(reader: R, mut writer: W, ctx: &ListenCtx) -> Result<(), ProtocolError>
where
    R: tokio::io::AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    loop {
        let request: Request = match read_frame(&mut reader).await {
            Ok(request) => request,
            Err(ProtocolError::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e),
        };

        // Cheap retention sweep on every request.
        ctx.jobs.sweep(JOB_RETENTION);

        let id = request.id;
        match request.method {
            Method::Health => {
                respond(
                    &mut writer,
                    id,
                    ResponseBody::Health {
                        healthy: true,
                        active_jobs: ctx.jobs.active_count(),
                        version: VERSION.to_string(),
                    },
                )
                .await?;
            }

            Method::StartJob(params) => {
                let body = match ctx.jobs.start_job(params) {
                    Ok(handle) => {
                        info!(job = %handle.id, "job started");
                        ResponseBody::JobStarted { job_id: handle.id.clone() }
                    }
                    Err(e) => ResponseBody::Error { message: e.to_string() },
                };
                respond(&mut writer, id, body).await?;
            }

            Method::ListJobs(params) => {
                let jobs = ctx.jobs.list(params.status.as_deref());
                respond(&mut writer, id, ResponseBody::Jobs { jobs }).await?;
            }

            Method::WatchJob(params) => {
                watch_job(&mut writer, id, params, ctx).await?;
            }

            Method::StopJob(params) => {
                let body = match ctx.jobs.get(&params.job_id) {
                    Some(job) => {
                        job.stop(params.force);
                        ResponseBody::Ok { ok: true }
                    }
                    None => ResponseBody::Error {
                        message: format!("job {} not found", params.job_id),
                    },
                };
                respond(&mut writer, id, body).await?;
            }

            Method::Shutdown(params) => {
                respond(&mut writer, id, ResponseBody::Ok { ok: true }).await?;
                shutdown(ctx, params).await;
                return Ok(());
            }
        }
    }
}

/// Stream `{seq, event}` frames until the job is terminal or the client
/// goes away. Sequence numbers are per job and monotone, so a client
/// can reconnect with `from_seq` and miss nothing.
async fn watch_job<W>(
    writer: &mut W,
    id: u64,
    params: WatchJobParams,
    ctx: &ListenCtx,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let Some(job) = ctx.jobs.get(&params.job_id) else {
        return respond(writer, id, ResponseBody::Error {
            message: format!("job {} not found", params.job_id),
        })
        .await;
    };

    let (backlog, mut live) = job.log.stream_from(params.from_seq);
    let mut last_seq = params.from_seq;
    for entry in backlog {
        last_seq = entry.seq;
        respond(writer, id, ResponseBody::WatchEvent { seq: entry.seq, event: entry.event })
            .await?;
    }

    // Terminal and fully replayed: close the stream.
    while !(job.status().is_terminal() && last_seq >= job.log.head()) {
        let entry = tokio::select! {
            entry = live.recv() => entry,
            // The job can go terminal without a final event reaching the
            // broadcast (e.g. force-stop); poll so the stream still ends.
            _ = tokio::time::sleep(Duration::from_millis(250)) => continue,
        };
        match entry {
            Ok(entry) => {
                if entry.seq <= last_seq {
                    continue;
                }
                last_seq = entry.seq;
                respond(
                    writer,
                    id,
                    ResponseBody::WatchEvent { seq: entry.seq, event: entry.event },
                )
                .await?;
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                // Catch up from the log; lagging loses nothing because
                // the log retains the full backlog.
                let (missed, fresh) = job.log.stream_from(last_seq);
                live = fresh;
                for entry in missed {
                    last_seq = entry.seq;
                    respond(
                        writer,
                        id,
                        ResponseBody::WatchEvent { seq: entry.seq, event: entry.event },
                    )
                    .await?;
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }

    respond(writer, id, ResponseBody::WatchEnd { last_seq }).await
}

async fn shutdown(ctx: &ListenCtx, params: ShutdownParams) {
    info!(wait = params.wait_for_jobs, "shutdown requested");
    ctx.jobs.stop_accepting();

    if params.wait_for_jobs {
        let timeout = Duration::from_secs(params.timeout_sec.unwrap_or(60));
        if !ctx.jobs.wait_for_jobs(timeout).await {
            warn!("jobs still active after {timeout:?}; cancelling");
        }
    }
    ctx.jobs.cancel_all(true);
    let _ = ctx.jobs.wait_for_jobs(Duration::from_secs(5)).await;

    // notify_one stores a permit, so the main loop sees the shutdown
    // even if it registers after this point.
    ctx.shutdown.notify_one();
}

async fn respond<W>(writer: &mut W, id: u64, body: ResponseBody) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    write_frame(writer, &Response { id, body }).await
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
