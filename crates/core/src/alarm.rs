// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Alarm records: one-shot and recurring reminders.

use crate::schedule::{next_snapped_time, parse_schedule, ScheduleError, SnapUnit};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

crate::define_id! {
    /// Random short identifier of an alarm.
    pub struct AlarmId;
}

impl AlarmId {
    /// Generate a fresh random alarm id.
    pub fn random() -> Self {
        Self(crate::id::short_token())
    }
}

/// Backoff steps applied after consecutive fire failures, clamped at the last.
const FAILURE_BACKOFF: [Duration; 3] = [
    Duration::from_secs(10),
    Duration::from_secs(30),
    Duration::from_secs(120),
];

/// A persistent reminder.
///
/// Stored one file per alarm under the town runtime directory; the fire loop
/// mutates it via [`Alarm::advance`] and [`Alarm::record_failure`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: AlarmId,
    /// The literal schedule DSL string the alarm was created from.
    pub schedule: String,
    /// Nudge target (session or `rig/role` address).
    pub target: String,
    pub message: String,
    pub recurring: bool,
    #[serde(with = "duration_ms")]
    pub interval: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snap_unit: Option<SnapUnit>,
    pub next_fire_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_fired_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fire_count: u64,
    #[serde(default)]
    pub fail_count: u32,
    #[serde(default)]
    pub last_error: String,
}

impl Alarm {
    /// Create an alarm by parsing a schedule DSL string.
    pub fn from_schedule(
        schedule: &str,
        target: impl Into<String>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, ScheduleError> {
        let parsed = parse_schedule(schedule, now)?;
        Ok(Self {
            id: AlarmId::random(),
            schedule: schedule.trim().to_string(),
            target: target.into(),
            message: message.into(),
            recurring: parsed.recurring,
            interval: parsed.interval,
            snap_unit: parsed.snap_unit,
            next_fire_at: parsed.next_fire_at,
            created_at: now,
            last_fired_at: None,
            fire_count: 0,
            fail_count: 0,
            last_error: String::new(),
        })
    }

    /// Whether the alarm is due at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_fire_at <= now
    }

    /// Record a successful fire.
    ///
    /// Recurring alarms get their next fire time recomputed (snapped if a
    /// snap unit is set). One-shots are left for the caller to delete.
    pub fn advance(&mut self, now: DateTime<Utc>) {
        self.fire_count += 1;
        self.fail_count = 0;
        self.last_error.clear();
        self.last_fired_at = Some(now);
        if self.recurring {
            self.next_fire_at = match self.snap_unit {
                Some(unit) => {
                    next_snapped_time(now.with_timezone(&Local), self.interval, unit)
                }
                None => now + chrono::Duration::milliseconds(self.interval.as_millis() as i64),
            };
        }
    }

    /// Record a failed fire: bounded backoff from the current wall time.
    ///
    /// The alarm is kept; `fire_count` is untouched.
    pub fn record_failure(&mut self, now: DateTime<Utc>, error: &str) {
        self.fail_count += 1;
        let idx = (self.fail_count as usize - 1).min(FAILURE_BACKOFF.len() - 1);
        let backoff = FAILURE_BACKOFF[idx];
        self.next_fire_at = now + chrono::Duration::milliseconds(backoff.as_millis() as i64);
        self.last_error = error.to_string();
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
#[path = "alarm_tests.rs"]
mod tests;
