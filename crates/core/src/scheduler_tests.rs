// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

use super::*;
use chrono::{TimeZone, Utc};
use std::time::Duration;

#[yare::parameterized(
    unset    = { None, false },
    zero     = { Some(0), false },
    negative = { Some(-3), false },
    positive = { Some(4), true },
)]
fn deferred_enabled(max_polecats: Option<i64>, expected: bool) {
    let config = SchedulerConfig {
        max_polecats,
        ..Default::default()
    };
    assert_eq!(config.deferred_enabled(), expected);
}

#[test]
fn defaults_match_documented_values() {
    let config = SchedulerConfig::default();
    assert_eq!(config.batch_size, 1);
    assert_eq!(config.spawn_delay, Duration::from_secs(2));
    assert!(config.max_polecats.is_none());
}

#[test]
fn pause_and_resume_track_operator() {
    let now = Utc.with_ymd_and_hms(2026, 3, 11, 9, 0, 0).unwrap();
    let mut state = SchedulerState::default();

    state.pause("mayor", now);
    assert!(state.paused);
    assert_eq!(state.paused_by, "mayor");
    assert_eq!(state.paused_at, Some(now));

    state.resume();
    assert!(!state.paused);
    assert!(state.paused_by.is_empty());
    assert!(state.paused_at.is_none());
}

#[test]
fn record_dispatch_updates_observability_fields() {
    let now = Utc.with_ymd_and_hms(2026, 3, 11, 9, 0, 0).unwrap();
    let mut state = SchedulerState::default();
    state.record_dispatch(3, now);
    assert_eq!(state.last_dispatch_at, Some(now));
    assert_eq!(state.last_dispatch_count, 3);
}

#[test]
fn state_json_roundtrip() {
    let now = Utc.with_ymd_and_hms(2026, 3, 11, 9, 0, 0).unwrap();
    let mut state = SchedulerState::default();
    state.pause("mayor", now);
    state.record_dispatch(2, now);
    let json = serde_json::to_string(&state).unwrap();
    let back: SchedulerState = serde_json::from_str(&json).unwrap();
    assert_eq!(back, state);
}
