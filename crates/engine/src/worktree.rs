// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worktree manager: isolated checkouts, one per unit.
//!
//! Operations on the same worktree are serialized by a per-unit async
//! mutex; distinct worktrees are independent. All VCS work is delegated
//! to the [`Git`] adapter.

use choo_adapters::{Git, VcsError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorktreeError {
    #[error("worktree for unit {unit:?} already exists")]
    AlreadyExists { unit: String },

    #[error("no worktree for unit {unit:?}")]
    NotFound { unit: String },

    #[error("worktree {path} is dirty; pass force to remove")]
    Dirty { path: PathBuf },

    #[error(transparent)]
    Vcs(#[from] VcsError),
}

/// An isolated working copy owned by exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worktree {
    pub unit_id: String,
    pub path: PathBuf,
    pub branch: String,
}

pub struct WorktreeManager {
    git: Arc<dyn Git>,
    repo_root: PathBuf,
    base_dir: PathBuf,
    branch_prefix: String,
    registry: Mutex<HashMap<String, Worktree>>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl WorktreeManager {
    pub fn new(
        git: Arc<dyn Git>,
        repo_root: impl Into<PathBuf>,
        base_dir: impl Into<PathBuf>,
        branch_prefix: impl Into<String>,
    ) -> Self {
        let repo_root = repo_root.into();
        let base_dir = base_dir.into();
        let base_dir = if base_dir.is_absolute() { base_dir } else { repo_root.join(base_dir) };
        Self {
            git,
            repo_root,
            base_dir,
            branch_prefix: branch_prefix.into(),
            registry: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn unit_lock(&self, unit_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(
            self.locks
                .lock()
                .entry(unit_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    /// Create a checkout for `unit_id` rooted at `base_branch`, on the
    /// branch `<prefix><unit_id>`.
    pub async fn create(&self, unit_id: &str, base_branch: &str) -> Result<Worktree, WorktreeError> {
        let lock = self.unit_lock(unit_id);
        let _guard = lock.lock().await;

        if self.registry.lock().contains_key(unit_id) {
            return Err(WorktreeError::AlreadyExists { unit: unit_id.to_string() });
        }

        let path = self.base_dir.join(unit_id);
        let branch = format!("{}{}", self.branch_prefix, unit_id);
        self.git.worktree_add(&self.repo_root, &path, &branch, base_branch).await?;

        let worktree = Worktree { unit_id: unit_id.to_string(), path, branch };
        self.registry.lock().insert(unit_id.to_string(), worktree.clone());
        Ok(worktree)
    }

    pub fn list(&self) -> Vec<Worktree> {
        let mut worktrees: Vec<Worktree> = self.registry.lock().values().cloned().collect();
        worktrees.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));
        worktrees
    }

    pub fn get(&self, unit_id: &str) -> Option<Worktree> {
        self.registry.lock().get(unit_id).cloned()
    }

    pub async fn has_uncommitted_changes(&self, unit_id: &str) -> Result<bool, WorktreeError> {
        let worktree = self
            .get(unit_id)
            .ok_or_else(|| WorktreeError::NotFound { unit: unit_id.to_string() })?;
        let lock = self.unit_lock(unit_id);
        let _guard = lock.lock().await;
        Ok(self.git.has_uncommitted_changes(&worktree.path).await?)
    }

    /// Remove the unit's worktree. Refuses when dirty unless `force`.
    pub async fn remove(&self, unit_id: &str, force: bool) -> Result<(), WorktreeError> {
        let worktree = self
            .get(unit_id)
            .ok_or_else(|| WorktreeError::NotFound { unit: unit_id.to_string() })?;

        let lock = self.unit_lock(unit_id);
        let _guard = lock.lock().await;

        if !force && self.git.has_uncommitted_changes(&worktree.path).await? {
            return Err(WorktreeError::Dirty { path: worktree.path });
        }

        self.git.worktree_remove(&worktree.path, force).await?;
        self.registry.lock().remove(unit_id);
        Ok(())
    }

    /// Drop the registry entry without touching the filesystem (failed
    /// units keep their worktree for inspection).
    pub fn release(&self, unit_id: &str) {
        self.registry.lock().remove(unit_id);
    }
}

#[cfg(test)]
#[path = "worktree_tests.rs"]
mod tests;
