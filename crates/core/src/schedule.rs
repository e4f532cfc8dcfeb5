// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Alarm schedule DSL.
//!
//! `<kind>:<payload>` where kind is `repeat`, `in`, or `at`:
//!
//! - `repeat:<dur>` — recurring every `<dur>`, first fire at now + dur
//! - `repeat:<dur>@<unit>` — recurring, snapped to the unit boundary
//! - `in:<dur>` — one-shot after `<dur>`
//! - `at:now` | `at:now+<dur>` | `at:now-<dur>` | `at:<RFC3339>` — one-shot
//!
//! Durations are compound ("1h30m"); a day token `Nd` means `N*24h`.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, Local, LocalResult, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;
use thiserror::Error;

/// Calendar boundary a recurring schedule snaps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapUnit {
    Second,
    Minute,
    Hour,
    Day,
    /// Sunday-based.
    Week,
    Month,
}

impl SnapUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapUnit::Second => "s",
            SnapUnit::Minute => "m",
            SnapUnit::Hour => "h",
            SnapUnit::Day => "d",
            SnapUnit::Week => "w",
            SnapUnit::Month => "mon",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "s" => Some(SnapUnit::Second),
            "m" => Some(SnapUnit::Minute),
            "h" => Some(SnapUnit::Hour),
            "d" => Some(SnapUnit::Day),
            "w" => Some(SnapUnit::Week),
            "mon" => Some(SnapUnit::Month),
            _ => None,
        }
    }
}

impl Serialize for SnapUnit {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SnapUnit {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        SnapUnit::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid snap unit: {}", raw)))
    }
}

impl std::fmt::Display for SnapUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from schedule parsing. Messages are stable grep targets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("invalid schedule format: missing ':' in {0:?}")]
    InvalidFormat(String),
    #[error("unknown schedule type {0:?} (want repeat, in, or at)")]
    UnknownType(String),
    #[error("invalid repeat duration {token:?}: {reason}")]
    InvalidRepeatDuration { token: String, reason: String },
    #[error("invalid snap unit {0:?} (want s, m, h, d, w, or mon)")]
    InvalidSnapUnit(String),
    #[error("invalid delay duration {token:?}: {reason}")]
    InvalidDelayDuration { token: String, reason: String },
    #[error("invalid at time {0:?}: expected 'now', 'now+<dur>', 'now-<dur>', or an RFC3339 timestamp")]
    InvalidAtTime(String),
}

/// Result of parsing a schedule string against a reference time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSchedule {
    pub recurring: bool,
    /// Zero for `at:` one-shots.
    pub interval: Duration,
    pub snap_unit: Option<SnapUnit>,
    pub next_fire_at: DateTime<Utc>,
}

/// Parse a compound duration string: `"90s"`, `"1h30m"`, `"2d"`, `"250ms"`.
///
/// Units are ms, s, m, h, and d, where `Nd` is treated as `N*24h`.
pub fn parse_extended_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut total_ms: u64 = 0;
    let mut rest = s;
    while !rest.is_empty() {
        let digits_end = rest
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if digits_end == 0 {
            return Err(format!("expected a number at {:?}", rest));
        }
        let num: u64 = rest[..digits_end]
            .parse()
            .map_err(|_| format!("invalid number in {:?}", s))?;

        let unit_rest = &rest[digits_end..];
        let unit_end = unit_rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(unit_rest.len());
        let unit = &unit_rest[..unit_end];

        let ms = match unit {
            "ms" => num,
            "s" => num * 1_000,
            "m" => num * 60_000,
            "h" => num * 3_600_000,
            // Day tokens are rewritten to hours: Nd == N*24h.
            "d" => num * 86_400_000,
            "" => return Err(format!("missing unit after {:?}", &rest[..digits_end])),
            other => return Err(format!("unknown duration unit {:?}", other)),
        };
        total_ms = total_ms
            .checked_add(ms)
            .ok_or_else(|| format!("duration overflow in {:?}", s))?;
        rest = &unit_rest[unit_end..];
    }

    Ok(Duration::from_millis(total_ms))
}

/// Parse a schedule string, computing the first fire time relative to `now`.
///
/// Snap boundaries are computed in the host's local timezone.
pub fn parse_schedule(input: &str, now: DateTime<Utc>) -> Result<ParsedSchedule, ScheduleError> {
    let input = input.trim();
    let (kind, payload) = input
        .split_once(':')
        .ok_or_else(|| ScheduleError::InvalidFormat(input.to_string()))?;

    match kind {
        "repeat" => {
            let (dur_str, snap_unit) = match payload.rsplit_once('@') {
                Some((dur, unit)) => {
                    let snap = SnapUnit::parse(unit)
                        .ok_or_else(|| ScheduleError::InvalidSnapUnit(unit.to_string()))?;
                    (dur, Some(snap))
                }
                None => (payload, None),
            };
            let interval = parse_extended_duration(dur_str).map_err(|reason| {
                ScheduleError::InvalidRepeatDuration {
                    token: dur_str.to_string(),
                    reason,
                }
            })?;
            if interval.is_zero() {
                return Err(ScheduleError::InvalidRepeatDuration {
                    token: dur_str.to_string(),
                    reason: "interval must be positive".to_string(),
                });
            }
            let next_fire_at = match snap_unit {
                Some(unit) => next_snapped_time(now.with_timezone(&Local), interval, unit),
                None => now + to_chrono(interval),
            };
            Ok(ParsedSchedule {
                recurring: true,
                interval,
                snap_unit,
                next_fire_at,
            })
        }
        "in" => {
            let delay = parse_extended_duration(payload).map_err(|reason| {
                ScheduleError::InvalidDelayDuration {
                    token: payload.to_string(),
                    reason,
                }
            })?;
            Ok(ParsedSchedule {
                recurring: false,
                interval: delay,
                snap_unit: None,
                next_fire_at: now + to_chrono(delay),
            })
        }
        "at" => {
            let next_fire_at = parse_at_payload(payload, now)?;
            Ok(ParsedSchedule {
                recurring: false,
                interval: Duration::ZERO,
                snap_unit: None,
                next_fire_at,
            })
        }
        other => Err(ScheduleError::UnknownType(other.to_string())),
    }
}

fn parse_at_payload(payload: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
    if payload == "now" {
        return Ok(now);
    }
    if let Some(rest) = payload.strip_prefix("now+") {
        let delay =
            parse_extended_duration(rest).map_err(|reason| ScheduleError::InvalidDelayDuration {
                token: rest.to_string(),
                reason,
            })?;
        return Ok(now + to_chrono(delay));
    }
    if let Some(rest) = payload.strip_prefix("now-") {
        let delay =
            parse_extended_duration(rest).map_err(|reason| ScheduleError::InvalidDelayDuration {
                token: rest.to_string(),
                reason,
            })?;
        return Ok(now - to_chrono(delay));
    }
    match DateTime::parse_from_rfc3339(payload) {
        Ok(t) => Ok(t.with_timezone(&Utc)),
        Err(_) => Err(ScheduleError::InvalidAtTime(payload.to_string())),
    }
}

/// Compute the next snapped fire time after `now`.
///
/// Truncates `now` to the snap boundary in `now`'s own timezone, then steps
/// forward by `interval` until strictly after `now`; the result is UTC.
///
/// The truncation happens in local (civil) time while the stored result is
/// UTC, so across DST transitions a `repeat:1h@d` alarm can fire 23 or 25
/// hours after creation. That is the intended behavior.
pub fn next_snapped_time<Tz: TimeZone>(
    now: DateTime<Tz>,
    interval: Duration,
    unit: SnapUnit,
) -> DateTime<Utc> {
    use chrono::Timelike;
    let naive = now.naive_local();
    let date = naive.date();
    let trunc = match unit {
        SnapUnit::Second => date.and_hms_opt(naive.hour(), naive.minute(), naive.second()),
        SnapUnit::Minute => date.and_hms_opt(naive.hour(), naive.minute(), 0),
        SnapUnit::Hour => date.and_hms_opt(naive.hour(), 0, 0),
        SnapUnit::Day => date.and_hms_opt(0, 0, 0),
        SnapUnit::Week => {
            let back = date.weekday().num_days_from_sunday() as i64;
            (date - ChronoDuration::days(back)).and_hms_opt(0, 0, 0)
        }
        SnapUnit::Month => date.with_day(1).and_then(|d| d.and_hms_opt(0, 0, 0)),
    };

    let base = match trunc {
        Some(t) => match now.timezone().from_local_datetime(&t) {
            LocalResult::Single(b) => b,
            LocalResult::Ambiguous(earliest, _) => earliest,
            // A DST gap swallowed the boundary; step from now instead.
            LocalResult::None => now.clone(),
        },
        None => now.clone(),
    };

    let step_ms = (interval.as_millis() as i64).max(1);
    let diff_ms = (now.clone() - base.clone()).num_milliseconds().max(0);
    let steps = diff_ms.div_euclid(step_ms) + 1;
    (base + ChronoDuration::milliseconds(steps * step_ms)).with_timezone(&Utc)
}

fn to_chrono(d: Duration) -> ChronoDuration {
    ChronoDuration::milliseconds(d.as_millis() as i64)
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
