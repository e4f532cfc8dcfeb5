// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Git plumbing adapters for the merge queue.
//!
//! The refinery owns all remote writes for a rig; this trait is the exact
//! surface it needs and nothing more. One adapter instance is bound to one
//! rig checkout.

mod cli;

pub use cli::CliGit;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeGit, GitCall};

use async_trait::async_trait;
use thiserror::Error;

/// Errors from git operations
#[derive(Debug, Clone, Error)]
pub enum GitError {
    #[error("git command failed: {0}")]
    CommandFailed(String),
}

/// Result of `git merge --squash`: empty conflicts means a clean stage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SquashResult {
    /// Conflicted paths from the porcelain diff-filter, not stderr parsing.
    pub conflicts: Vec<String>,
}

impl SquashResult {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// A submodule whose pointer moves between target and source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmoduleChange {
    pub path: String,
    /// The commit the source branch points the submodule at.
    pub sha: String,
}

/// Adapter over one rig checkout.
#[async_trait]
pub trait GitAdapter: Clone + Send + Sync + 'static {
    async fn branch_exists_local(&self, branch: &str) -> Result<bool, GitError>;

    async fn branch_exists_remote(&self, branch: &str) -> Result<bool, GitError>;

    async fn checkout(&self, branch: &str) -> Result<(), GitError>;

    /// Pull `branch` from origin. Callers treat failures as best-effort.
    async fn pull(&self, branch: &str) -> Result<(), GitError>;

    /// Dry conflict probe (merge-tree), without touching the worktree.
    async fn merge_would_conflict(&self, source: &str, target: &str) -> Result<bool, GitError>;

    /// Stage a squash merge of `source` into the checked-out branch.
    async fn squash_merge(&self, source: &str) -> Result<SquashResult, GitError>;

    /// Unstage a conflicted squash merge.
    async fn abort_merge(&self) -> Result<(), GitError>;

    /// Commit staged changes; returns the new head sha.
    async fn commit(&self, message: &str) -> Result<String, GitError>;

    /// Head commit message of a branch (preserves conventional-commit
    /// prefixes for the squash commit).
    async fn head_message(&self, branch: &str) -> Result<String, GitError>;

    /// Head commit sha of a branch.
    async fn head_sha(&self, branch: &str) -> Result<String, GitError>;

    async fn push(&self, branch: &str) -> Result<(), GitError>;

    async fn reset_hard(&self, to_ref: &str) -> Result<(), GitError>;

    async fn delete_branch_local(&self, branch: &str) -> Result<(), GitError>;

    async fn delete_branch_remote(&self, branch: &str) -> Result<(), GitError>;

    async fn prune_remote(&self) -> Result<(), GitError>;

    /// Submodule pointers that differ between target and source.
    async fn submodule_pointer_changes(
        &self,
        source: &str,
        target: &str,
    ) -> Result<Vec<SubmoduleChange>, GitError>;

    async fn ensure_submodules_initialized(&self) -> Result<(), GitError>;

    /// Push a submodule's pending commit to its origin.
    async fn push_submodule(&self, path: &str) -> Result<(), GitError>;
}
