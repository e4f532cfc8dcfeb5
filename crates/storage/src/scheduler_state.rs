// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Scheduler state persistence.
//!
//! A single JSON record written atomically (tmp + rename) so a human pausing
//! the scheduler and a dispatch cycle recording its metrics cannot corrupt
//! the file by racing.

use crate::{RuntimeDir, StoreError};
use dk_core::SchedulerState;
use std::path::PathBuf;

/// Atomic store for the per-town scheduler record.
#[derive(Debug, Clone)]
pub struct SchedulerStateStore {
    path: PathBuf,
    legacy_path: PathBuf,
}

impl SchedulerStateStore {
    pub fn new(runtime: &RuntimeDir) -> Self {
        Self {
            path: runtime.scheduler_state_path(),
            legacy_path: runtime.legacy_queue_state_path(),
        }
    }

    /// Load the record, falling back to the legacy file name and then to
    /// defaults when neither exists.
    pub fn load(&self) -> Result<SchedulerState, StoreError> {
        for path in [&self.path, &self.legacy_path] {
            match std::fs::read(path) {
                Ok(bytes) => {
                    return serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    })
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(SchedulerState::default())
    }

    /// Atomically persist the record.
    pub fn save(&self, state: &SchedulerState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(state).map_err(|e| StoreError::Corrupt {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Read-modify-write helper.
    pub fn update<F>(&self, mutate: F) -> Result<SchedulerState, StoreError>
    where
        F: FnOnce(&mut SchedulerState),
    {
        let mut state = self.load()?;
        mutate(&mut state);
        self.save(&state)?;
        Ok(state)
    }
}

#[cfg(test)]
#[path = "scheduler_state_tests.rs"]
mod tests;
