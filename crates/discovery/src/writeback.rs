// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status writeback into unit and task files.
//!
//! Only the worker that owns a unit writes to it; other readers take a
//! brief advisory lock, so every mutation here runs under an exclusive
//! `fs2` lock for the read-modify-write window. Unknown front-matter
//! keys always survive.

use crate::frontmatter::{Document, FrontMatterError};
use crate::plan;
use crate::task;
use chrono::{DateTime, Utc};
use choo_core::TaskStatus;
use fs2::FileExt;
use serde_yaml::Value;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WritebackError {
    #[error("cannot update {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot update {path}: {source}")]
    FrontMatter {
        path: std::path::PathBuf,
        #[source]
        source: FrontMatterError,
    },
}

/// Locked read-modify-write of one markdown document.
pub fn update_document(
    path: &Path,
    mutate: impl FnOnce(&mut Document),
) -> Result<(), WritebackError> {
    let io_err = |source| WritebackError::Io { path: path.to_path_buf(), source };
    let fm_err = |source| WritebackError::FrontMatter { path: path.to_path_buf(), source };

    let mut file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(io_err)?;
    file.lock_exclusive().map_err(io_err)?;

    let result = (|| {
        let mut content = String::new();
        file.read_to_string(&mut content).map_err(io_err)?;

        let mut doc = Document::parse(&content).map_err(fm_err)?;
        mutate(&mut doc);
        let rendered = doc.render().map_err(fm_err)?;

        file.seek(SeekFrom::Start(0)).map_err(io_err)?;
        file.set_len(0).map_err(io_err)?;
        file.write_all(rendered.as_bytes()).map_err(io_err)?;
        Ok(())
    })();

    // Lock releases on drop as well; unlock explicitly for clarity.
    let _ = fs2::FileExt::unlock(&file);
    result
}

/// Update the `status` key of a task file.
pub fn set_task_status(task_path: &Path, status: TaskStatus) -> Result<(), WritebackError> {
    update_document(task_path, |doc| {
        doc.set(task::KEY_STATUS, Value::from(status.to_string()));
    })
}

/// Apply arbitrary plan-key updates.
pub fn set_plan_keys(
    plan_path: &Path,
    mutate: impl FnOnce(&mut Document),
) -> Result<(), WritebackError> {
    update_document(plan_path, mutate)
}

/// Record the orchestrator status for a unit.
pub fn record_status(plan_path: &Path, status: choo_core::UnitStatus) -> Result<(), WritebackError> {
    set_plan_keys(plan_path, |doc| {
        doc.set(plan::KEY_ORCH_STATUS, Value::from(status.to_string()));
    })
}

/// Record branch and start time when a worker picks the unit up.
pub fn record_started(
    plan_path: &Path,
    branch: &str,
    at: DateTime<Utc>,
) -> Result<(), WritebackError> {
    set_plan_keys(plan_path, |doc| {
        doc.set(plan::KEY_ORCH_STATUS, Value::from("in_progress"));
        doc.set(plan::KEY_ORCH_BRANCH, Value::from(branch));
        doc.set(plan::KEY_ORCH_STARTED_AT, Value::from(at.to_rfc3339()));
    })
}

/// Record the terminal status and completion time.
pub fn record_completed(
    plan_path: &Path,
    status: choo_core::UnitStatus,
    at: DateTime<Utc>,
) -> Result<(), WritebackError> {
    set_plan_keys(plan_path, |doc| {
        doc.set(plan::KEY_ORCH_STATUS, Value::from(status.to_string()));
        doc.set(plan::KEY_ORCH_COMPLETED_AT, Value::from(at.to_rfc3339()));
    })
}

/// Record the PR number, exactly once. Returns false when a number was
/// already present (the existing value is kept).
pub fn record_pr_number(plan_path: &Path, pr: u64) -> Result<bool, WritebackError> {
    let mut written = false;
    set_plan_keys(plan_path, |doc| {
        if doc.get_u64(plan::KEY_ORCH_PR_NUMBER).is_none() {
            doc.set(plan::KEY_ORCH_PR_NUMBER, Value::from(pr));
            written = true;
        }
    })?;
    Ok(written)
}

#[cfg(test)]
#[path = "writeback_tests.rs"]
mod tests;
