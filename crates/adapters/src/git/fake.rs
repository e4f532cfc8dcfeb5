// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! In-memory git for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{GitAdapter, GitError, SquashResult, SubmoduleChange};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Recorded git call
#[derive(Debug, Clone, PartialEq)]
pub enum GitCall {
    Checkout { branch: String },
    Pull { branch: String },
    SquashMerge { source: String },
    AbortMerge,
    Commit { message: String },
    Push { branch: String },
    ResetHard { to_ref: String },
    DeleteLocal { branch: String },
    DeleteRemote { branch: String },
    PruneRemote,
    SubmoduleInit,
    SubmodulePush { path: String },
}

struct FakeGitState {
    local_branches: HashSet<String>,
    remote_branches: HashSet<String>,
    /// Source branches whose squash merge conflicts, with the paths.
    squash_conflicts: HashMap<String, Vec<String>>,
    /// (source, target) pairs the dry probe reports as conflicting.
    probe_conflicts: HashSet<(String, String)>,
    head_messages: HashMap<String, String>,
    submodule_changes: HashMap<String, Vec<SubmoduleChange>>,
    /// Branches whose push fails.
    push_failures: HashSet<String>,
    calls: Vec<GitCall>,
    next_sha: u64,
}

/// In-memory git adapter for testing
#[derive(Clone)]
pub struct FakeGit {
    inner: Arc<Mutex<FakeGitState>>,
}

impl Default for FakeGit {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeGitState {
                local_branches: HashSet::from(["main".to_string()]),
                remote_branches: HashSet::from(["main".to_string()]),
                squash_conflicts: HashMap::new(),
                probe_conflicts: HashSet::new(),
                head_messages: HashMap::new(),
                submodule_changes: HashMap::new(),
                push_failures: HashSet::new(),
                calls: Vec::new(),
                next_sha: 0,
            })),
        }
    }
}

impl FakeGit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<GitCall> {
        self.inner.lock().calls.clone()
    }

    pub fn add_local_branch(&self, branch: &str) -> Self {
        self.inner.lock().local_branches.insert(branch.to_string());
        self.clone()
    }

    pub fn add_remote_branch(&self, branch: &str) -> Self {
        self.inner.lock().remote_branches.insert(branch.to_string());
        self.clone()
    }

    pub fn set_head_message(&self, branch: &str, message: &str) {
        self.inner
            .lock()
            .head_messages
            .insert(branch.to_string(), message.to_string());
    }

    /// Make squash merges of `source` conflict on the given paths.
    pub fn set_squash_conflicts(&self, source: &str, paths: &[&str]) {
        self.inner.lock().squash_conflicts.insert(
            source.to_string(),
            paths.iter().map(|p| p.to_string()).collect(),
        );
    }

    /// Make the dry probe report a conflict for (source, target).
    pub fn set_probe_conflict(&self, source: &str, target: &str) {
        self.inner
            .lock()
            .probe_conflicts
            .insert((source.to_string(), target.to_string()));
    }

    /// Clear a scripted probe conflict (the branch was rebased).
    pub fn clear_probe_conflict(&self, source: &str, target: &str) {
        self.inner
            .lock()
            .probe_conflicts
            .remove(&(source.to_string(), target.to_string()));
    }

    pub fn set_submodule_changes(&self, source: &str, changes: Vec<SubmoduleChange>) {
        self.inner
            .lock()
            .submodule_changes
            .insert(source.to_string(), changes);
    }

    pub fn fail_push(&self, branch: &str) {
        self.inner.lock().push_failures.insert(branch.to_string());
    }

    pub fn allow_push(&self, branch: &str) {
        self.inner.lock().push_failures.remove(branch);
    }
}

#[async_trait]
impl GitAdapter for FakeGit {
    async fn branch_exists_local(&self, branch: &str) -> Result<bool, GitError> {
        Ok(self.inner.lock().local_branches.contains(branch))
    }

    async fn branch_exists_remote(&self, branch: &str) -> Result<bool, GitError> {
        Ok(self.inner.lock().remote_branches.contains(branch))
    }

    async fn checkout(&self, branch: &str) -> Result<(), GitError> {
        let mut state = self.inner.lock();
        if !state.local_branches.contains(branch) {
            return Err(GitError::CommandFailed(format!(
                "git checkout: pathspec {:?} did not match",
                branch
            )));
        }
        state.calls.push(GitCall::Checkout {
            branch: branch.to_string(),
        });
        Ok(())
    }

    async fn pull(&self, branch: &str) -> Result<(), GitError> {
        self.inner.lock().calls.push(GitCall::Pull {
            branch: branch.to_string(),
        });
        Ok(())
    }

    async fn merge_would_conflict(&self, source: &str, target: &str) -> Result<bool, GitError> {
        Ok(self
            .inner
            .lock()
            .probe_conflicts
            .contains(&(source.to_string(), target.to_string())))
    }

    async fn squash_merge(&self, source: &str) -> Result<SquashResult, GitError> {
        let mut state = self.inner.lock();
        state.calls.push(GitCall::SquashMerge {
            source: source.to_string(),
        });
        let conflicts = state
            .squash_conflicts
            .get(source)
            .cloned()
            .unwrap_or_default();
        Ok(SquashResult { conflicts })
    }

    async fn abort_merge(&self) -> Result<(), GitError> {
        self.inner.lock().calls.push(GitCall::AbortMerge);
        Ok(())
    }

    async fn commit(&self, message: &str) -> Result<String, GitError> {
        let mut state = self.inner.lock();
        state.calls.push(GitCall::Commit {
            message: message.to_string(),
        });
        state.next_sha += 1;
        Ok(format!("{:040x}", state.next_sha))
    }

    async fn head_message(&self, branch: &str) -> Result<String, GitError> {
        Ok(self
            .inner
            .lock()
            .head_messages
            .get(branch)
            .cloned()
            .unwrap_or_else(|| format!("work from {}", branch)))
    }

    async fn head_sha(&self, branch: &str) -> Result<String, GitError> {
        let state = self.inner.lock();
        if !state.local_branches.contains(branch) {
            return Err(GitError::CommandFailed(format!(
                "git rev-parse: unknown revision {:?}",
                branch
            )));
        }
        Ok(format!("{:032x}{:08x}", branch.len(), branch.len()))
    }

    async fn push(&self, branch: &str) -> Result<(), GitError> {
        let mut state = self.inner.lock();
        state.calls.push(GitCall::Push {
            branch: branch.to_string(),
        });
        if state.push_failures.contains(branch) {
            return Err(GitError::CommandFailed(format!(
                "git push: failed to push refs to origin/{}",
                branch
            )));
        }
        Ok(())
    }

    async fn reset_hard(&self, to_ref: &str) -> Result<(), GitError> {
        self.inner.lock().calls.push(GitCall::ResetHard {
            to_ref: to_ref.to_string(),
        });
        Ok(())
    }

    async fn delete_branch_local(&self, branch: &str) -> Result<(), GitError> {
        let mut state = self.inner.lock();
        state.calls.push(GitCall::DeleteLocal {
            branch: branch.to_string(),
        });
        state.local_branches.remove(branch);
        Ok(())
    }

    async fn delete_branch_remote(&self, branch: &str) -> Result<(), GitError> {
        let mut state = self.inner.lock();
        state.calls.push(GitCall::DeleteRemote {
            branch: branch.to_string(),
        });
        state.remote_branches.remove(branch);
        Ok(())
    }

    async fn prune_remote(&self) -> Result<(), GitError> {
        self.inner.lock().calls.push(GitCall::PruneRemote);
        Ok(())
    }

    async fn submodule_pointer_changes(
        &self,
        source: &str,
        _target: &str,
    ) -> Result<Vec<SubmoduleChange>, GitError> {
        Ok(self
            .inner
            .lock()
            .submodule_changes
            .get(source)
            .cloned()
            .unwrap_or_default())
    }

    async fn ensure_submodules_initialized(&self) -> Result<(), GitError> {
        self.inner.lock().calls.push(GitCall::SubmoduleInit);
        Ok(())
    }

    async fn push_submodule(&self, path: &str) -> Result<(), GitError> {
        self.inner.lock().calls.push(GitCall::SubmodulePush {
            path: path.to_string(),
        });
        Ok(())
    }
}
