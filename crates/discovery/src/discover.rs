// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unit directory discovery and validation.

use crate::frontmatter::FrontMatterError;
use crate::plan::{PlanFile, PLAN_FILENAME};
use crate::task::{is_task_filename, TaskFile};
use choo_core::{Task, TaskStatus, Unit};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Structural issues with the unit directory. Fatal for the whole run.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed front matter in {path}: {source}")]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: FrontMatterError,
    },

    #[error("duplicate unit id {id:?}")]
    DuplicateUnit { id: String },

    #[error("duplicate task number {number} in unit {unit:?}")]
    DuplicateTask { unit: String, number: u32 },

    #[error("unit {unit:?} depends on unknown unit {depends_on:?}")]
    UnknownUnitDependency { unit: String, depends_on: String },

    #[error("task {task} in unit {unit:?} depends on unknown task {depends_on}")]
    UnknownTaskDependency { unit: String, task: u32, depends_on: u32 },

    #[error("task dependency cycle in unit {unit:?}: {cycle:?}")]
    TaskCycle { unit: String, cycle: Vec<u32> },
}

/// Parse a tasks directory into an ordered unit list.
///
/// Subdirectories without an `IMPLEMENTATION_PLAN.md` are skipped with a
/// warning; everything else is validated strictly. Tasks found
/// `in_progress` (a previous run died mid-task) are reset to pending so
/// the owning worker re-runs them from the task boundary.
pub fn discover(tasks_dir: &Path) -> Result<Vec<Unit>, DiscoveryError> {
    let entries = std::fs::read_dir(tasks_dir)
        .map_err(|source| DiscoveryError::Io { path: tasks_dir.to_path_buf(), source })?;

    let mut dirs: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|source| DiscoveryError::Io { path: tasks_dir.to_path_buf(), source })?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();

    let mut units = Vec::new();
    let mut seen = HashSet::new();
    for dir in dirs {
        let Some(unit) = discover_unit(&dir)? else { continue };
        if !seen.insert(unit.id.clone()) {
            return Err(DiscoveryError::DuplicateUnit { id: unit.id });
        }
        units.push(unit);
    }

    validate_unit_deps(&units)?;
    Ok(units)
}

fn discover_unit(dir: &Path) -> Result<Option<Unit>, DiscoveryError> {
    let id = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let plan_path = dir.join(PLAN_FILENAME);
    if !plan_path.exists() {
        tracing::warn!(dir = %dir.display(), "skipping directory without {}", PLAN_FILENAME);
        return Ok(None);
    }

    let plan_content = std::fs::read_to_string(&plan_path)
        .map_err(|source| DiscoveryError::Io { path: plan_path.clone(), source })?;
    let plan = PlanFile::parse(&plan_content)
        .map_err(|source| DiscoveryError::FrontMatter { path: plan_path.clone(), source })?;

    if let Some(declared) = &plan.unit {
        if declared != &id {
            tracing::warn!(
                unit = %id,
                declared = %declared,
                "plan `unit` key disagrees with directory name; directory name wins"
            );
        }
    }

    let tasks = discover_tasks(&id, dir)?;
    validate_task_deps(&id, &tasks)?;

    let status = plan.status_override.unwrap_or_else(|| Unit::derived_status(&tasks));

    Ok(Some(Unit {
        id,
        path: dir.to_path_buf(),
        depends_on: plan.depends_on.iter().cloned().collect::<BTreeSet<_>>(),
        status,
        tasks,
        provider: plan.provider,
        pr_number: plan.pr_number,
        started_at: plan.started_at,
        completed_at: plan.completed_at,
    }))
}

fn discover_tasks(unit: &str, dir: &Path) -> Result<Vec<Task>, DiscoveryError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|source| DiscoveryError::Io { path: dir.to_path_buf(), source })?;

    let mut names: Vec<String> = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|source| DiscoveryError::Io { path: dir.to_path_buf(), source })?;
        let name = entry.file_name().to_string_lossy().to_string();
        if entry.path().is_file() && is_task_filename(&name) {
            names.push(name);
        }
    }
    names.sort();

    let mut tasks = Vec::new();
    let mut numbers = HashSet::new();
    for name in names {
        let path = dir.join(&name);
        let parsed = TaskFile::load(&path)
            .map_err(|source| DiscoveryError::Io { path: path.clone(), source })?;

        let mut task = parsed.task;
        if !numbers.insert(task.number) {
            return Err(DiscoveryError::DuplicateTask { unit: unit.to_string(), number: task.number });
        }
        if task.status == TaskStatus::InProgress {
            tracing::info!(unit, task = task.number, "resetting in_progress task for retry");
            task.status = TaskStatus::Pending;
        }
        tasks.push(task);
    }

    tasks.sort_by_key(|t| t.number);
    Ok(tasks)
}

fn validate_task_deps(unit: &str, tasks: &[Task]) -> Result<(), DiscoveryError> {
    let numbers: HashSet<u32> = tasks.iter().map(|t| t.number).collect();
    for task in tasks {
        for dep in &task.depends_on {
            if !numbers.contains(dep) {
                return Err(DiscoveryError::UnknownTaskDependency {
                    unit: unit.to_string(),
                    task: task.number,
                    depends_on: *dep,
                });
            }
        }
    }

    if let Some(cycle) = find_task_cycle(tasks) {
        return Err(DiscoveryError::TaskCycle { unit: unit.to_string(), cycle });
    }
    Ok(())
}

/// DFS three-color cycle search over the intra-unit task graph.
fn find_task_cycle(tasks: &[Task]) -> Option<Vec<u32>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        White,
        Grey,
        Black,
    }

    fn visit(
        n: u32,
        tasks: &[Task],
        marks: &mut std::collections::HashMap<u32, Mark>,
        stack: &mut Vec<u32>,
    ) -> Option<Vec<u32>> {
        marks.insert(n, Mark::Grey);
        stack.push(n);
        if let Some(task) = tasks.iter().find(|t| t.number == n) {
            for dep in &task.depends_on {
                match marks.get(dep).copied().unwrap_or(Mark::White) {
                    Mark::Grey => {
                        let start = stack.iter().position(|x| x == dep).unwrap_or(0);
                        let mut cycle = stack[start..].to_vec();
                        cycle.push(*dep);
                        return Some(cycle);
                    }
                    Mark::White => {
                        if let Some(cycle) = visit(*dep, tasks, marks, stack) {
                            return Some(cycle);
                        }
                    }
                    Mark::Black => {}
                }
            }
        }
        stack.pop();
        marks.insert(n, Mark::Black);
        None
    }

    let mut marks = std::collections::HashMap::new();
    for task in tasks {
        if marks.get(&task.number).copied().unwrap_or(Mark::White) == Mark::White {
            let mut stack = Vec::new();
            if let Some(cycle) = visit(task.number, tasks, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
    }
    None
}

fn validate_unit_deps(units: &[Unit]) -> Result<(), DiscoveryError> {
    let ids: HashSet<&str> = units.iter().map(|u| u.id.as_str()).collect();
    for unit in units {
        for dep in &unit.depends_on {
            if !ids.contains(dep.as_str()) {
                return Err(DiscoveryError::UnknownUnitDependency {
                    unit: unit.id.clone(),
                    depends_on: dep.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "discover_tests.rs"]
mod tests;
