// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Scheduler configuration and the per-town operator-control record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scheduler configuration knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum concurrently running polecat agents. `None` or `<= 0` means
    /// the deferred scheduler is disabled and work dispatches directly.
    pub max_polecats: Option<i64>,
    /// How many items one dispatch cycle may launch.
    pub batch_size: usize,
    /// Pause between launches within a cycle, to keep the tracker from
    /// seeing a thundering herd of lock acquisitions.
    #[serde(with = "duration_ms")]
    pub spawn_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_polecats: None,
            batch_size: 1,
            spawn_delay: Duration::from_secs(2),
        }
    }
}

impl SchedulerConfig {
    /// Whether deferred dispatch is enabled.
    pub fn deferred_enabled(&self) -> bool {
        self.max_polecats.is_some_and(|n| n > 0)
    }
}

/// Single per-town scheduler state record.
///
/// Operator control and observability only; the dispatch pipeline derives
/// everything else from the tracker. Persisted atomically (tmp + rename).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerState {
    pub paused: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub paused_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_dispatch_at: Option<DateTime<Utc>>,
    pub last_dispatch_count: usize,
}

impl SchedulerState {
    pub fn pause(&mut self, by: impl Into<String>, now: DateTime<Utc>) {
        self.paused = true;
        self.paused_by = by.into();
        self.paused_at = Some(now);
    }

    pub fn resume(&mut self) {
        self.paused = false;
        self.paused_by.clear();
        self.paused_at = None;
    }

    pub fn record_dispatch(&mut self, count: usize, now: DateTime<Utc>) {
        self.last_dispatch_at = Some(now);
        self.last_dispatch_count = count;
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (duration.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
