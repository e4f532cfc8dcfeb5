// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Fake process table for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ProcEntry, ProcError, ProcSnapshot, ProcessTable, TermSignal};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

struct FakeProcState {
    entries: Vec<ProcEntry>,
    exe_names: HashMap<i32, String>,
    signals: Vec<(i32, TermSignal)>,
    /// Pids removed from the table once signalled (simulating death).
    die_on_term: bool,
}

/// Fake process table for testing
#[derive(Clone)]
pub struct FakeProcessTable {
    inner: Arc<Mutex<FakeProcState>>,
}

impl Default for FakeProcessTable {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeProcState {
                entries: Vec::new(),
                exe_names: HashMap::new(),
                signals: Vec::new(),
                die_on_term: true,
            })),
        }
    }
}

impl FakeProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_process(&self, pid: i32, ppid: i32, pgid: i32, comm: &str) -> Self {
        self.inner.lock().entries.push(ProcEntry {
            pid,
            ppid,
            pgid,
            comm: comm.to_string(),
        });
        self.clone()
    }

    pub fn set_exe_name(&self, pid: i32, name: &str) {
        self.inner.lock().exe_names.insert(pid, name.to_string());
    }

    /// Keep processes alive through SIGTERM (to exercise the forced kill).
    pub fn survive_term(&self) {
        self.inner.lock().die_on_term = false;
    }

    /// Signals delivered, in order.
    pub fn signals(&self) -> Vec<(i32, TermSignal)> {
        self.inner.lock().signals.clone()
    }

    pub fn alive(&self, pid: i32) -> bool {
        self.inner.lock().entries.iter().any(|e| e.pid == pid)
    }
}

#[async_trait]
impl ProcessTable for FakeProcessTable {
    async fn snapshot(&self) -> Result<ProcSnapshot, ProcError> {
        Ok(ProcSnapshot::from_entries(
            self.inner.lock().entries.clone(),
        ))
    }

    async fn exe_basename(&self, pid: i32) -> Option<String> {
        let state = self.inner.lock();
        state
            .exe_names
            .get(&pid)
            .cloned()
            .or_else(|| {
                state
                    .entries
                    .iter()
                    .find(|e| e.pid == pid)
                    .map(|e| e.comm.clone())
            })
    }

    async fn signal(&self, pid: i32, signal: TermSignal) {
        let mut state = self.inner.lock();
        state.signals.push((pid, signal));
        let dies = matches!(signal, TermSignal::Kill) || state.die_on_term;
        if dies {
            state.entries.retain(|e| e.pid != pid);
        }
    }
}
