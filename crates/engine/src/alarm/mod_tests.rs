// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

use super::*;
use dk_core::{Alarm, FakeClock};
use dk_storage::RuntimeDir;
use parking_lot::Mutex;
use std::sync::Arc;

fn engine() -> (tempfile::TempDir, FakeClock, AlarmEngine<FakeClock>) {
    let tmp = tempfile::tempdir().unwrap();
    let clock = FakeClock::at_epoch();
    let store = AlarmStore::new(&RuntimeDir::new(tmp.path()));
    (tmp, clock.clone(), AlarmEngine::new(store, clock))
}

fn recorder() -> (Arc<Mutex<Vec<(String, String)>>>, impl Fn(String, String) -> std::future::Ready<Result<(), String>>) {
    let sent: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&sent);
    let nudge = move |target: String, message: String| {
        sink.lock().push((target, message));
        std::future::ready(Ok(()))
    };
    (sent, nudge)
}

#[tokio::test]
async fn due_alarms_fire_with_id_prefixed_message() {
    let (_tmp, clock, engine) = engine();
    let alarm = Alarm::from_schedule("in:1m", "gastown/witness", "status check", clock.now())
        .unwrap();
    engine.store().save(&alarm).unwrap();
    clock.advance(chrono::Duration::minutes(2));

    let (sent, nudge) = recorder();
    let report = engine.fire_due(nudge).await.unwrap();

    assert_eq!(report, FireReport { fired: 1, failed: 0 });
    let sent = sent.lock();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "gastown/witness");
    assert_eq!(sent[0].1, format!("[alarm {}] status check", alarm.id));
}

#[tokio::test]
async fn not_yet_due_alarms_stay_quiet() {
    let (_tmp, clock, engine) = engine();
    let alarm = Alarm::from_schedule("in:1h", "t", "m", clock.now()).unwrap();
    engine.store().save(&alarm).unwrap();

    let (sent, nudge) = recorder();
    let report = engine.fire_due(nudge).await.unwrap();
    assert_eq!(report, FireReport::default());
    assert!(sent.lock().is_empty());
}

#[tokio::test]
async fn one_shot_is_deleted_after_firing() {
    let (_tmp, clock, engine) = engine();
    let alarm = Alarm::from_schedule("in:1m", "t", "m", clock.now()).unwrap();
    engine.store().save(&alarm).unwrap();
    clock.advance(chrono::Duration::minutes(5));

    let (_sent, nudge) = recorder();
    engine.fire_due(nudge).await.unwrap();

    assert!(engine.store().list().unwrap().is_empty());
}

#[tokio::test]
async fn recurring_alarm_is_rescheduled() {
    let (_tmp, clock, engine) = engine();
    let alarm = Alarm::from_schedule("repeat:10m", "t", "m", clock.now()).unwrap();
    engine.store().save(&alarm).unwrap();
    clock.advance(chrono::Duration::minutes(11));

    let (_sent, nudge) = recorder();
    engine.fire_due(nudge).await.unwrap();

    let saved = engine.store().load(alarm.id.as_str()).unwrap();
    assert_eq!(saved.fire_count, 1);
    assert!(saved.next_fire_at > clock.now());
}

#[tokio::test]
async fn failed_fire_backs_off_and_keeps_the_alarm() {
    let (_tmp, clock, engine) = engine();
    let alarm = Alarm::from_schedule("repeat:10m", "t", "m", clock.now()).unwrap();
    engine.store().save(&alarm).unwrap();
    clock.advance(chrono::Duration::minutes(11));

    let nudge = |_target: String, _message: String| {
        std::future::ready(Err("no such session".to_string()))
    };
    let report = engine.fire_due(nudge).await.unwrap();
    assert_eq!(report, FireReport { fired: 0, failed: 1 });

    let saved = engine.store().load(alarm.id.as_str()).unwrap();
    assert_eq!(saved.fail_count, 1);
    assert_eq!(saved.last_error, "no such session");
    assert_eq!(
        saved.next_fire_at,
        clock.now() + chrono::Duration::seconds(10)
    );
    assert_eq!(saved.fire_count, 0);
}

#[tokio::test]
async fn only_due_alarms_fire_among_many() {
    let (_tmp, clock, engine) = engine();
    let mut past = Alarm::from_schedule("in:1m", "past", "m", clock.now()).unwrap();
    past.next_fire_at = clock.now() - chrono::Duration::seconds(60);
    let mut future = Alarm::from_schedule("in:1m", "future", "m", clock.now()).unwrap();
    future.next_fire_at = clock.now() + chrono::Duration::minutes(60);
    engine.store().save(&past).unwrap();
    engine.store().save(&future).unwrap();

    let (sent, nudge) = recorder();
    engine.fire_due(nudge).await.unwrap();

    let sent = sent.lock();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "past");
}
