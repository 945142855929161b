// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake collaborators for engine and daemon tests.
//!
//! `FakeGit` keeps a light filesystem model: a worktree is a real
//! directory, and "commits" are snapshots of the file listing, so
//! change detection behaves like the real thing without a repository.

use crate::forge::{Forge, ForgeError, PrRequest, ReviewState};
use crate::git::{Git, VcsError, WorktreeInfo};
use crate::provider::{OutputSink, Provider, ProviderError, ProviderType};
use crate::reviewer::{ReviewResult, Reviewer, ReviewerError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// FakeProvider

/// One recorded provider invocation.
#[derive(Debug, Clone)]
pub struct ProviderCall {
    pub prompt: String,
    pub workdir: PathBuf,
}

type ProviderScript = dyn Fn(usize, &ProviderCall) -> Result<(), ProviderError> + Send + Sync;

/// Scriptable in-memory provider.
#[derive(Clone)]
pub struct FakeProvider {
    name: ProviderType,
    calls: Arc<Mutex<Vec<ProviderCall>>>,
    script: Arc<ProviderScript>,
}

impl FakeProvider {
    /// Succeeds on every invocation without touching the workdir.
    pub fn new() -> Self {
        Self {
            name: ProviderType::new("fake"),
            calls: Arc::new(Mutex::new(Vec::new())),
            script: Arc::new(|_, _| Ok(())),
        }
    }

    /// Run `script(call_index, call)` on each invocation.
    pub fn with_script(
        script: impl Fn(usize, &ProviderCall) -> Result<(), ProviderError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: ProviderType::new("fake"),
            calls: Arc::new(Mutex::new(Vec::new())),
            script: Arc::new(script),
        }
    }

    /// Write `file_name` into the workdir on every invocation, the way a
    /// real agent leaves edits behind.
    pub fn writing_file(file_name: &str) -> Self {
        let name = file_name.to_string();
        Self::with_script(move |i, call| {
            std::fs::write(call.workdir.join(&name), format!("edit {i}\n"))
                .map_err(|e| ProviderError::Invocation(e.to_string()))
        })
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().clone()
    }
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn name(&self) -> ProviderType {
        self.name.clone()
    }

    async fn invoke(
        &self,
        prompt: &str,
        workdir: &Path,
        _stdout: &dyn OutputSink,
        _stderr: &dyn OutputSink,
    ) -> Result<(), ProviderError> {
        let call = ProviderCall { prompt: prompt.to_string(), workdir: workdir.to_path_buf() };
        let index = {
            let mut calls = self.calls.lock();
            calls.push(call.clone());
            calls.len() - 1
        };
        (self.script)(index, &call)
    }
}

// ---------------------------------------------------------------------------
// FakeReviewer

/// Reviewer returning queued results; clean once the queue is empty.
#[derive(Clone, Default)]
pub struct FakeReviewer {
    queue: Arc<Mutex<VecDeque<ReviewResult>>>,
    calls: Arc<Mutex<Vec<(PathBuf, String)>>>,
    unavailable: Arc<Mutex<bool>>,
}

impl FakeReviewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, result: ReviewResult) {
        self.queue.lock().push_back(result);
    }

    pub fn set_unavailable(&self) {
        *self.unavailable.lock() = true;
    }

    pub fn calls(&self) -> Vec<(PathBuf, String)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Reviewer for FakeReviewer {
    async fn review(&self, workdir: &Path, base_ref: &str) -> Result<ReviewResult, ReviewerError> {
        self.calls.lock().push((workdir.to_path_buf(), base_ref.to_string()));
        if *self.unavailable.lock() {
            return Err(ReviewerError::Unavailable("fake reviewer offline".to_string()));
        }
        Ok(self
            .queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| ReviewResult::clean("no findings")))
    }
}

// ---------------------------------------------------------------------------
// FakeGit

#[derive(Default)]
struct FakeGitState {
    /// worktree path → branch
    worktrees: HashMap<PathBuf, String>,
    /// worktree path → file listing at last commit
    snapshots: HashMap<PathBuf, HashMap<String, u64>>,
    /// worktree path → commit messages
    commits: HashMap<PathBuf, Vec<String>>,
    pushes: Vec<String>,
    rebases: Vec<PathBuf>,
    rebase_failures: VecDeque<VcsError>,
    staged: HashMap<PathBuf, bool>,
}

/// Filesystem-backed fake VCS.
#[derive(Clone, Default)]
pub struct FakeGit {
    state: Arc<Mutex<FakeGitState>>,
}

impl FakeGit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a failure for the next `rebase_onto` call.
    pub fn fail_next_rebase(&self) {
        self.state.lock().rebase_failures.push_back(VcsError::Command {
            op: "rebase".to_string(),
            detail: "scripted failure".to_string(),
        });
    }

    pub fn commits(&self, path: &Path) -> Vec<String> {
        self.state.lock().commits.get(path).cloned().unwrap_or_default()
    }

    pub fn pushed_branches(&self) -> Vec<String> {
        self.state.lock().pushes.clone()
    }

    pub fn rebase_count(&self) -> usize {
        self.state.lock().rebases.len()
    }

    pub fn branch_of(&self, path: &Path) -> Option<String> {
        self.state.lock().worktrees.get(path).cloned()
    }

    fn listing(path: &Path) -> HashMap<String, u64> {
        use std::hash::{Hash, Hasher};

        fn walk(dir: &Path, root: &Path, acc: &mut HashMap<String, u64>) {
            let Ok(entries) = std::fs::read_dir(dir) else { return };
            for entry in entries.flatten() {
                let p = entry.path();
                let name = entry.file_name().to_string_lossy().to_string();
                if name == ".git" {
                    continue;
                }
                if p.is_dir() {
                    walk(&p, root, acc);
                } else if let Ok(contents) = std::fs::read(&p) {
                    let rel = p
                        .strip_prefix(root)
                        .map(|r| r.to_string_lossy().to_string())
                        .unwrap_or(name);
                    let mut hasher = std::collections::hash_map::DefaultHasher::new();
                    contents.hash(&mut hasher);
                    acc.insert(rel, hasher.finish());
                }
            }
        }
        let mut acc = HashMap::new();
        walk(path, path, &mut acc);
        acc
    }
}

#[async_trait]
impl Git for FakeGit {
    async fn worktree_add(
        &self,
        _repo_root: &Path,
        path: &Path,
        branch: &str,
        _start_point: &str,
    ) -> Result<(), VcsError> {
        std::fs::create_dir_all(path).map_err(|e| VcsError::Command {
            op: "worktree add".to_string(),
            detail: e.to_string(),
        })?;
        let mut state = self.state.lock();
        state.worktrees.insert(path.to_path_buf(), branch.to_string());
        state.snapshots.insert(path.to_path_buf(), Self::listing(path));
        Ok(())
    }

    async fn worktree_remove(&self, path: &Path, _force: bool) -> Result<(), VcsError> {
        let mut state = self.state.lock();
        state.worktrees.remove(path);
        state.snapshots.remove(path);
        drop(state);
        let _ = std::fs::remove_dir_all(path);
        Ok(())
    }

    async fn worktree_list(&self, _repo_root: &Path) -> Result<Vec<WorktreeInfo>, VcsError> {
        Ok(self
            .state
            .lock()
            .worktrees
            .iter()
            .map(|(path, branch)| WorktreeInfo {
                path: path.clone(),
                branch: Some(branch.clone()),
            })
            .collect())
    }

    async fn changed_files(&self, path: &Path) -> Result<Vec<String>, VcsError> {
        let snapshot = self.state.lock().snapshots.get(path).cloned().unwrap_or_default();
        let now = Self::listing(path);
        let mut changed: Vec<String> = now
            .iter()
            .filter(|(name, len)| snapshot.get(*name) != Some(len))
            .map(|(name, _)| name.clone())
            .collect();
        for name in snapshot.keys() {
            if !now.contains_key(name) {
                changed.push(name.clone());
            }
        }
        changed.sort();
        Ok(changed)
    }

    async fn stage_all(&self, path: &Path) -> Result<(), VcsError> {
        self.state.lock().staged.insert(path.to_path_buf(), true);
        Ok(())
    }

    async fn commit(&self, path: &Path, message: &str, _no_verify: bool) -> Result<(), VcsError> {
        let mut state = self.state.lock();
        state.commits.entry(path.to_path_buf()).or_default().push(message.to_string());
        state.snapshots.insert(path.to_path_buf(), Self::listing(path));
        state.staged.insert(path.to_path_buf(), false);
        Ok(())
    }

    async fn push(&self, _path: &Path, branch: &str) -> Result<(), VcsError> {
        self.state.lock().pushes.push(branch.to_string());
        Ok(())
    }

    async fn rebase_onto(&self, path: &Path, _target_branch: &str) -> Result<(), VcsError> {
        let mut state = self.state.lock();
        state.rebases.push(path.to_path_buf());
        if let Some(err) = state.rebase_failures.pop_front() {
            return Err(err);
        }
        Ok(())
    }

    async fn clean_worktree(&self, path: &Path) {
        // Restore the snapshot illusion: whatever is on disk becomes clean.
        let listing = Self::listing(path);
        self.state.lock().snapshots.insert(path.to_path_buf(), listing);
    }
}

// ---------------------------------------------------------------------------
// FakeForge

#[derive(Default)]
struct FakeForgeState {
    next_pr: u64,
    opened: Vec<PrRequest>,
    review_states: VecDeque<ReviewState>,
    merge_results: VecDeque<Result<(), ForgeError>>,
    merged: Vec<u64>,
}

/// In-memory forge with scriptable review and merge outcomes.
#[derive(Clone)]
pub struct FakeForge {
    state: Arc<Mutex<FakeForgeState>>,
}

impl FakeForge {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeForgeState {
                next_pr: 100,
                ..Default::default()
            })),
        }
    }

    /// Queue a review state returned by the next poll. When the queue is
    /// empty, polls return `Approved`.
    pub fn enqueue_review_state(&self, state: ReviewState) {
        self.state.lock().review_states.push_back(state);
    }

    /// Queue the next merge outcome. Defaults to success.
    pub fn enqueue_merge_result(&self, result: Result<(), ForgeError>) {
        self.state.lock().merge_results.push_back(result);
    }

    pub fn opened_prs(&self) -> Vec<PrRequest> {
        self.state.lock().opened.clone()
    }

    pub fn merged_prs(&self) -> Vec<u64> {
        self.state.lock().merged.clone()
    }
}

impl Default for FakeForge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Forge for FakeForge {
    async fn open_pr(&self, _repo: &Path, request: &PrRequest) -> Result<u64, ForgeError> {
        let mut state = self.state.lock();
        state.opened.push(request.clone());
        let pr = state.next_pr;
        state.next_pr += 1;
        Ok(pr)
    }

    async fn review_state(&self, _repo: &Path, _pr: u64) -> Result<ReviewState, ForgeError> {
        Ok(self.state.lock().review_states.pop_front().unwrap_or(ReviewState::Approved))
    }

    async fn merge_pr(&self, _repo: &Path, pr: u64) -> Result<(), ForgeError> {
        let result = self.state.lock().merge_results.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            self.state.lock().merged.push(pr);
        }
        result
    }
}
