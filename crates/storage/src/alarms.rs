// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! One-file-per-alarm persistence.
//!
//! Files live at `<town>/.runtime/alarms/<id>.json`, mode 0644. The
//! directory listing seeds the set on boot; ordering by next fire time is
//! applied on read.

use crate::{RuntimeDir, StoreError};
use chrono::{DateTime, Utc};
use dk_core::Alarm;
use std::path::PathBuf;

/// Filesystem store for alarms.
#[derive(Debug, Clone)]
pub struct AlarmStore {
    dir: PathBuf,
}

impl AlarmStore {
    pub fn new(runtime: &RuntimeDir) -> Self {
        Self {
            dir: runtime.alarms_dir(),
        }
    }

    fn path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Write (or overwrite) an alarm file.
    pub fn save(&self, alarm: &Alarm) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path(alarm.id.as_str());
        let json = serde_json::to_string_pretty(alarm).map_err(|e| StoreError::Corrupt {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, json)?;
        set_file_mode(&path)?;
        Ok(())
    }

    pub fn load(&self, id: &str) -> Result<Alarm, StoreError> {
        let path = self.path(id);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// All alarms, sorted by next fire time.
    ///
    /// Unreadable files are skipped with a warning so one corrupt record
    /// cannot take down the fire loop.
    pub fn list(&self) -> Result<Vec<Alarm>, StoreError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut alarms = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match std::fs::read(&path).map_err(StoreError::from).and_then(|b| {
                serde_json::from_slice::<Alarm>(&b).map_err(|e| StoreError::Corrupt {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })
            }) {
                Ok(alarm) => alarms.push(alarm),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable alarm");
                }
            }
        }
        alarms.sort_by_key(|a| a.next_fire_at);
        Ok(alarms)
    }

    /// Alarms whose next fire time is at or before `now`, sorted.
    pub fn due(&self, now: DateTime<Utc>) -> Result<Vec<Alarm>, StoreError> {
        let mut alarms = self.list()?;
        alarms.retain(|a| a.is_due(now));
        Ok(alarms)
    }

    /// Cancel an alarm. Absent file is a not-found error.
    pub fn cancel(&self, id: &str) -> Result<(), StoreError> {
        let path = self.path(id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove an alarm file if present (used after a one-shot fires).
    pub fn remove(&self, id: &str) -> Result<(), StoreError> {
        match std::fs::remove_file(self.path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn set_file_mode(path: &std::path::Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_file_mode(_path: &std::path::Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
#[path = "alarms_tests.rs"]
mod tests;
