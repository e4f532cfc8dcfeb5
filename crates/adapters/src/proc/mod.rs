// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Process table adapters.
//!
//! [`ProcSnapshot`] is a pure view of the process tree taken at one instant;
//! all topology questions (children, descendants, groups) are answered from
//! it without touching the system again. The trait adds signal delivery and
//! executable-name lookup, which cannot be snapshotted.

mod ps;

pub use ps::PsProcessTable;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeProcessTable;

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Maximum recursion depth when walking descendants.
const MAX_TREE_DEPTH: usize = 10;

/// Errors from process table operations
#[derive(Debug, Clone, Error)]
pub enum ProcError {
    #[error("process table unavailable: {0}")]
    Unavailable(String),
}

/// Signal used for termination sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermSignal {
    Term,
    Kill,
}

/// One row of the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcEntry {
    pub pid: i32,
    pub ppid: i32,
    pub pgid: i32,
    /// Command name as reported by the kernel (`comm`), max 15 chars on Linux.
    pub comm: String,
}

/// Point-in-time view of the process tree.
///
/// Nonexistent pids yield empty results, never errors.
#[derive(Debug, Clone, Default)]
pub struct ProcSnapshot {
    by_pid: HashMap<i32, ProcEntry>,
    children: HashMap<i32, Vec<i32>>,
}

impl ProcSnapshot {
    pub fn from_entries(entries: Vec<ProcEntry>) -> Self {
        let mut by_pid = HashMap::with_capacity(entries.len());
        let mut children: HashMap<i32, Vec<i32>> = HashMap::new();
        for entry in entries {
            children.entry(entry.ppid).or_default().push(entry.pid);
            by_pid.insert(entry.pid, entry);
        }
        for kids in children.values_mut() {
            kids.sort_unstable();
        }
        Self { by_pid, children }
    }

    /// Immediate children of a pid.
    pub fn children(&self, pid: i32) -> Vec<i32> {
        self.children.get(&pid).cloned().unwrap_or_default()
    }

    /// All descendants of a pid, deepest first.
    ///
    /// Deepest-first ordering matters for termination: killing a parent
    /// before its children reparents them to init and loses the tree.
    /// Recursion is capped at depth 10.
    pub fn descendants_deepest_first(&self, pid: i32) -> Vec<i32> {
        let mut out = Vec::new();
        self.collect_descendants(pid, 0, &mut out);
        out
    }

    fn collect_descendants(&self, pid: i32, depth: usize, out: &mut Vec<i32>) {
        if depth >= MAX_TREE_DEPTH {
            return;
        }
        for child in self.children(pid) {
            self.collect_descendants(child, depth + 1, out);
            out.push(child);
        }
    }

    pub fn ppid(&self, pid: i32) -> Option<i32> {
        self.by_pid.get(&pid).map(|e| e.ppid)
    }

    pub fn pgid(&self, pid: i32) -> Option<i32> {
        self.by_pid.get(&pid).map(|e| e.pgid)
    }

    /// All pids belonging to a process group.
    pub fn group_members(&self, pgid: i32) -> Vec<i32> {
        let mut members: Vec<i32> = self
            .by_pid
            .values()
            .filter(|e| e.pgid == pgid)
            .map(|e| e.pid)
            .collect();
        members.sort_unstable();
        members
    }

    pub fn comm(&self, pid: i32) -> Option<&str> {
        self.by_pid.get(&pid).map(|e| e.comm.as_str())
    }

    pub fn exists(&self, pid: i32) -> bool {
        self.by_pid.contains_key(&pid)
    }
}

/// Adapter for process topology and signals.
#[async_trait]
pub trait ProcessTable: Clone + Send + Sync + 'static {
    /// Take a fresh snapshot of the whole process table.
    async fn snapshot(&self) -> Result<ProcSnapshot, ProcError>;

    /// Basename of the executable behind a pid. Catches agents that rewrite
    /// argv[0] (where `comm` shows a version string instead of the binary).
    async fn exe_basename(&self, pid: i32) -> Option<String>;

    /// Deliver a signal. Best-effort; missing processes are ignored.
    async fn signal(&self, pid: i32, signal: TermSignal);
}
