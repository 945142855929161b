// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job manager: registry of isolated orchestrator runs.

use choo_core::{EventBus, JobId, RunConfig};
use choo_engine::{EngineDeps, Orchestrator, RunSummary};
use choo_storage::{JobEventLog, SnapshotWriter};
use choo_wire::{JobEntry, JobStatus, StartJobParams};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// How long terminal jobs stay listed before the sweep removes them.
pub const JOB_RETENTION: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Error)]
pub enum StartJobError {
    #[error("tasks directory {0} is already being orchestrated by job {1}")]
    TasksDirBusy(PathBuf, JobId),

    #[error("daemon is shutting down")]
    ShuttingDown,
}

/// Builds the external collaborators for one job.
///
/// A factory (rather than shared instances) keeps jobs isolated and
/// lets tests substitute fakes per job.
pub type JobDeps = Arc<dyn Fn() -> EngineDeps + Send + Sync>;

/// One run owned by the daemon.
#[derive(Debug)]
pub struct JobHandle {
    pub id: JobId,
    pub tasks_dir: PathBuf,
    pub feature_branch: Option<String>,
    pub started_at: DateTime<Utc>,
    pub log: JobEventLog,
    status: Mutex<JobStatus>,
    finished_at: Mutex<Option<DateTime<Utc>>>,
    summary: Mutex<Option<RunSummary>>,
    cancel: CancellationToken,
    join: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl JobHandle {
    pub fn status(&self) -> JobStatus {
        *self.status.lock()
    }

    pub fn summary(&self) -> Option<RunSummary> {
        self.summary.lock().clone()
    }

    pub fn entry(&self) -> JobEntry {
        let summary = self.summary.lock();
        let (complete, total) = match summary.as_ref() {
            Some(s) => (s.complete, s.total),
            None => (0, 0),
        };
        JobEntry {
            job_id: self.id.clone(),
            feature_branch: self.feature_branch.clone(),
            status: self.status(),
            started_at: self.started_at,
            units_complete: complete,
            units_total: total,
        }
    }

    /// Request cancellation; `force` also aborts the driver task.
    pub fn stop(&self, force: bool) {
        self.cancel.cancel();
        if force {
            if let Some(join) = self.join.lock().take() {
                join.abort();
            }
            let mut status = self.status.lock();
            if !status.is_terminal() {
                *status = JobStatus::Stopped;
                *self.finished_at.lock() = Some(Utc::now());
            }
        }
    }
}

/// Registry of jobs, keyed by job id.
pub struct JobManager {
    jobs: Mutex<HashMap<JobId, Arc<JobHandle>>>,
    jobs_dir: PathBuf,
    deps: JobDeps,
    accepting: Mutex<bool>,
}

impl JobManager {
    pub fn new(jobs_dir: PathBuf, deps: JobDeps) -> Self {
        Self { jobs: Mutex::new(HashMap::new()), jobs_dir, deps, accepting: Mutex::new(true) }
    }

    /// Start a job. Two concurrent jobs over the same tasks directory
    /// are rejected; overlapping them would violate the one-writer-per-
    /// unit invariant.
    pub fn start_job(&self, params: StartJobParams) -> Result<Arc<JobHandle>, StartJobError> {
        if !*self.accepting.lock() {
            return Err(StartJobError::ShuttingDown);
        }

        let tasks_dir = params.tasks_dir.clone();
        let mut jobs = self.jobs.lock();
        if let Some(existing) = jobs
            .values()
            .find(|j| j.tasks_dir == tasks_dir && j.status() == JobStatus::Running)
        {
            return Err(StartJobError::TasksDirBusy(tasks_dir, existing.id.clone()));
        }

        let id = JobId::generate();
        let config = config_from_params(&params);
        let cancel = CancellationToken::new();

        // Per-job isolation: fresh bus, log, snapshot, and collaborators.
        let bus = EventBus::new();
        let log = JobEventLog::new();
        bus.subscribe(Arc::new(log.clone()));

        let job_state_dir = self.jobs_dir.join(id.as_str());
        if let Err(e) = std::fs::create_dir_all(&job_state_dir) {
            tracing::warn!(error = %e, "cannot create job state dir");
        } else {
            bus.subscribe(Arc::new(SnapshotWriter::new(job_state_dir.join("snapshot.json"))));
        }

        let handle = Arc::new(JobHandle {
            id: id.clone(),
            tasks_dir,
            feature_branch: params.feature_branch.clone(),
            started_at: Utc::now(),
            log,
            status: Mutex::new(JobStatus::Running),
            finished_at: Mutex::new(None),
            summary: Mutex::new(None),
            cancel: cancel.clone(),
            join: Mutex::new(None),
        });

        let orchestrator = Orchestrator::new(config, (self.deps)(), bus.clone(), cancel);
        let driver_handle = Arc::clone(&handle);
        let join = tokio::spawn(async move {
            let result = orchestrator.run().await;
            bus.close().await;

            let mut status = driver_handle.status.lock();
            match result {
                Ok(summary) => {
                    *status = if summary.succeeded() {
                        JobStatus::Completed
                    } else {
                        JobStatus::Failed
                    };
                    *driver_handle.summary.lock() = Some(summary);
                }
                Err(err) => {
                    tracing::error!(job = %driver_handle.id, error = %err, "job failed to run");
                    *status = JobStatus::Failed;
                }
            }
            *driver_handle.finished_at.lock() = Some(Utc::now());
        });
        *handle.join.lock() = Some(join);

        jobs.insert(id, Arc::clone(&handle));
        Ok(handle)
    }

    pub fn get(&self, id: &str) -> Option<Arc<JobHandle>> {
        self.jobs.lock().get(id).cloned()
    }

    /// Jobs, newest first, optionally filtered by status names.
    pub fn list(&self, status_filter: Option<&[String]>) -> Vec<JobEntry> {
        let mut entries: Vec<JobEntry> = self
            .jobs
            .lock()
            .values()
            .map(|j| j.entry())
            .filter(|e| match status_filter {
                Some(filter) => filter.iter().any(|s| s == &e.status.to_string()),
                None => true,
            })
            .collect();
        entries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        entries
    }

    pub fn active_count(&self) -> usize {
        self.jobs.lock().values().filter(|j| j.status() == JobStatus::Running).count()
    }

    /// Stop accepting new jobs (shutdown).
    pub fn stop_accepting(&self) {
        *self.accepting.lock() = false;
    }

    /// Cancel every running job.
    pub fn cancel_all(&self, force: bool) {
        for job in self.jobs.lock().values() {
            if job.status() == JobStatus::Running {
                job.stop(force);
            }
        }
    }

    /// Wait until no job is running or the deadline passes. Returns
    /// whether everything finished.
    pub async fn wait_for_jobs(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.active_count() == 0 {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Drop terminal jobs older than the retention interval.
    pub fn sweep(&self, retention: Duration) {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::zero());
        self.jobs.lock().retain(|_, job| {
            let finished = *job.finished_at.lock();
            match finished {
                Some(at) if job.status().is_terminal() => at > cutoff,
                _ => true,
            }
        });
    }
}

fn config_from_params(params: &StartJobParams) -> RunConfig {
    let mut builder = RunConfig::builder(params.tasks_dir.clone())
        .skip_review(params.skip_review)
        .no_pr(params.no_pr);

    // The repository is the ancestor of <repo>/specs/tasks when the
    // caller passes that shape; otherwise fall back to the tasks dir.
    let repo_root = params
        .tasks_dir
        .parent()
        .and_then(|p| p.parent())
        .unwrap_or(&params.tasks_dir)
        .to_path_buf();
    builder = builder.repo_root(repo_root);

    if let Some(parallelism) = params.parallelism {
        builder = builder.parallelism(parallelism);
    }
    if let Some(branch) = &params.target_branch {
        builder = builder.target_branch(branch.clone());
    }
    if let Some(branch) = &params.feature_branch {
        builder = builder.feature_branch(branch.clone());
    }
    if let Some(unit) = &params.unit {
        builder = builder.only_unit(unit.clone());
    }
    if let Some(provider) = &params.provider {
        builder = builder.provider(provider.clone());
    }
    builder.build()
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
pub(crate) mod tests;
