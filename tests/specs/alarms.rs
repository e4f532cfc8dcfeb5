// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Alarm engine scenarios: parse, persist, fire.

use chrono::{DateTime, Duration, Timelike, Utc};
use dk_core::{Alarm, Clock, FakeClock, SnapUnit};
use dk_engine::AlarmEngine;
use dk_storage::{AlarmStore, RuntimeDir};

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-11T14:23:47Z")
        .unwrap()
        .with_timezone(&Utc)
}

#[test]
fn minute_snapped_repeat_parses_to_a_boundary() {
    let parsed = dk_core::parse_schedule("repeat:1m@m", now()).unwrap();
    assert!(parsed.recurring);
    assert_eq!(parsed.interval, std::time::Duration::from_secs(60));
    assert_eq!(parsed.snap_unit, Some(SnapUnit::Minute));
    assert_eq!(parsed.next_fire_at.second(), 0);
    assert!(parsed.next_fire_at > now());
}

#[test]
fn save_list_cancel_lifecycle() {
    let tmp = tempfile::tempdir().unwrap();
    let store = AlarmStore::new(&RuntimeDir::new(tmp.path()));

    let alarm = Alarm::from_schedule("repeat:1m@m", "gastown/witness", "status check", now())
        .unwrap();
    assert!(alarm.recurring);
    assert_eq!(alarm.interval, std::time::Duration::from_secs(60));
    assert_eq!(alarm.snap_unit, Some(SnapUnit::Minute));
    store.save(&alarm).unwrap();

    let listed = store.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].target, "gastown/witness");

    store.cancel(listed[0].id.as_str()).unwrap();
    assert_eq!(store.list().unwrap().len(), 0);
}

#[test]
fn due_returns_exactly_the_elapsed_alarm() {
    let tmp = tempfile::tempdir().unwrap();
    let store = AlarmStore::new(&RuntimeDir::new(tmp.path()));

    let mut past = Alarm::from_schedule("in:1m", "past", "m", now()).unwrap();
    past.next_fire_at = now() - Duration::seconds(60);
    let mut future = Alarm::from_schedule("in:1m", "future", "m", now()).unwrap();
    future.next_fire_at = now() + Duration::minutes(60);
    store.save(&past).unwrap();
    store.save(&future).unwrap();

    let due = store.due(now()).unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, past.id);
}

#[tokio::test]
async fn fire_failure_backs_off_then_recovery_advances() {
    let tmp = tempfile::tempdir().unwrap();
    let clock = FakeClock::new(now());
    let store = AlarmStore::new(&RuntimeDir::new(tmp.path()));
    let engine = AlarmEngine::new(store, clock.clone());

    let alarm = Alarm::from_schedule("repeat:5m", "alpha-witness", "poll", now()).unwrap();
    engine.store().save(&alarm).unwrap();
    clock.advance(Duration::minutes(6));

    // Session missing: the alarm backs off 10s and survives.
    let report = engine
        .fire_due(|_t, _m| std::future::ready(Err("session not found".to_string())))
        .await
        .unwrap();
    assert_eq!(report.failed, 1);
    let stored = engine.store().load(alarm.id.as_str()).unwrap();
    assert_eq!(stored.fail_count, 1);
    assert_eq!(stored.next_fire_at, clock.now() + Duration::seconds(10));

    // Next pass succeeds: counters reset, schedule resumes.
    clock.advance(Duration::seconds(11));
    let report = engine
        .fire_due(|_t, _m| std::future::ready(Ok(())))
        .await
        .unwrap();
    assert_eq!(report.fired, 1);
    let stored = engine.store().load(alarm.id.as_str()).unwrap();
    assert_eq!(stored.fail_count, 0);
    assert_eq!(stored.fire_count, 1);
    assert!(stored.last_error.is_empty());
}
