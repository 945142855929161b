// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Archiving completed units and resetting orchestrator state.

use crate::frontmatter::FrontMatterError;
use crate::plan::{self, PLAN_FILENAME};
use crate::task::is_task_filename;
use crate::writeback::{self, WritebackError};
use choo_core::TaskStatus;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("unit {unit:?} has incomplete tasks; not archiving")]
    Incomplete { unit: String },

    #[error("unit {unit:?} not found under {tasks_dir}")]
    NotFound { unit: String, tasks_dir: PathBuf },

    #[error("cannot archive {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed unit {path}: {source}")]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: FrontMatterError,
    },

    #[error(transparent)]
    Writeback(#[from] WritebackError),
}

/// Move a unit directory into the completed archive.
///
/// The unit moves iff every task is complete. The directory rename is the
/// commit point, so observers see either the whole unit in `tasks/` or
/// the whole unit in `completed/tasks/` and nothing in between. A
/// matching spec file (`<unit>.md` next to the tasks dir, matched
/// case-insensitively) is moved best-effort afterwards.
pub fn archive_unit(
    tasks_dir: &Path,
    completed_dir: &Path,
    unit: &str,
) -> Result<PathBuf, ArchiveError> {
    let unit_dir = tasks_dir.join(unit);
    if !unit_dir.is_dir() {
        return Err(ArchiveError::NotFound {
            unit: unit.to_string(),
            tasks_dir: tasks_dir.to_path_buf(),
        });
    }

    ensure_all_tasks_complete(unit, &unit_dir)?;

    let dest_tasks = completed_dir.join("tasks");
    std::fs::create_dir_all(&dest_tasks)
        .map_err(|source| ArchiveError::Io { path: dest_tasks.clone(), source })?;

    let dest = dest_tasks.join(unit);
    std::fs::rename(&unit_dir, &dest)
        .map_err(|source| ArchiveError::Io { path: unit_dir.clone(), source })?;

    if let Some(spec) = find_matching_spec(tasks_dir, unit) {
        if let Some(name) = spec.file_name() {
            let spec_dest = completed_dir.join(name);
            if let Err(e) = std::fs::rename(&spec, &spec_dest) {
                tracing::warn!(spec = %spec.display(), error = %e, "could not move matching spec");
            }
        }
    }

    Ok(dest)
}

fn ensure_all_tasks_complete(unit: &str, unit_dir: &Path) -> Result<(), ArchiveError> {
    let entries = std::fs::read_dir(unit_dir)
        .map_err(|source| ArchiveError::Io { path: unit_dir.to_path_buf(), source })?;

    for entry in entries {
        let entry =
            entry.map_err(|source| ArchiveError::Io { path: unit_dir.to_path_buf(), source })?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !is_task_filename(&name) {
            continue;
        }
        let parsed = crate::task::TaskFile::load(&entry.path())
            .map_err(|source| ArchiveError::Io { path: entry.path(), source })?;
        if parsed.task.status != TaskStatus::Complete {
            return Err(ArchiveError::Incomplete { unit: unit.to_string() });
        }
    }
    Ok(())
}

/// `<unit>.md` sibling of the tasks directory, matched case-insensitively.
fn find_matching_spec(tasks_dir: &Path, unit: &str) -> Option<PathBuf> {
    let specs_root = tasks_dir.parent()?;
    let wanted = format!("{}.md", unit.to_lowercase());
    let entries = std::fs::read_dir(specs_root).ok()?;
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if name == wanted && entry.path().is_file() {
            return Some(entry.path());
        }
    }
    None
}

/// Null out the orchestrator-owned plan keys and reset task statuses,
/// preserving everything the user wrote (`cleanup --reset-state`).
pub fn reset_state(unit_dir: &Path) -> Result<(), ArchiveError> {
    let plan_path = unit_dir.join(PLAN_FILENAME);
    if plan_path.exists() {
        writeback::set_plan_keys(&plan_path, |doc| {
            for key in [
                plan::KEY_ORCH_STATUS,
                plan::KEY_ORCH_BRANCH,
                plan::KEY_ORCH_PR_NUMBER,
                plan::KEY_ORCH_STARTED_AT,
                plan::KEY_ORCH_COMPLETED_AT,
            ] {
                if doc.matter.contains_key(key) {
                    doc.set_null(key);
                }
            }
        })?;
    }

    let entries = std::fs::read_dir(unit_dir)
        .map_err(|source| ArchiveError::Io { path: unit_dir.to_path_buf(), source })?;
    for entry in entries {
        let entry =
            entry.map_err(|source| ArchiveError::Io { path: unit_dir.to_path_buf(), source })?;
        let name = entry.file_name().to_string_lossy().to_string();
        if is_task_filename(&name) {
            writeback::set_task_status(&entry.path(), TaskStatus::Pending)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "archive_tests.rs"]
mod tests;
