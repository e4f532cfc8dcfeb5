// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

use super::*;
use chrono::{TimeZone, Utc};

fn store() -> (tempfile::TempDir, SchedulerStateStore) {
    let tmp = tempfile::tempdir().unwrap();
    let rt = RuntimeDir::new(tmp.path());
    (tmp, SchedulerStateStore::new(&rt))
}

#[test]
fn missing_file_loads_defaults() {
    let (_tmp, store) = store();
    let state = store.load().unwrap();
    assert!(!state.paused);
    assert_eq!(state.last_dispatch_count, 0);
}

#[test]
fn save_and_load_round_trip() {
    let (_tmp, store) = store();
    let now = Utc.with_ymd_and_hms(2026, 3, 11, 10, 0, 0).unwrap();
    let mut state = SchedulerState::default();
    state.pause("mayor", now);
    store.save(&state).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded, state);
}

#[test]
fn save_leaves_no_tmp_file_behind() {
    let (_tmp, store) = store();
    store.save(&SchedulerState::default()).unwrap();
    assert!(store.path.exists());
    assert!(!store.path.with_extension("json.tmp").exists());
}

#[test]
fn legacy_file_name_is_read_when_canonical_absent() {
    let (_tmp, store) = store();
    let mut state = SchedulerState::default();
    state.paused = true;
    std::fs::create_dir_all(store.legacy_path.parent().unwrap()).unwrap();
    std::fs::write(
        &store.legacy_path,
        serde_json::to_string(&state).unwrap(),
    )
    .unwrap();

    assert!(store.load().unwrap().paused);

    // The canonical file wins once written.
    let mut newer = SchedulerState::default();
    newer.record_dispatch(5, Utc.with_ymd_and_hms(2026, 3, 11, 10, 0, 0).unwrap());
    store.save(&newer).unwrap();
    assert_eq!(store.load().unwrap(), newer);
}

#[test]
fn update_is_read_modify_write() {
    let (_tmp, store) = store();
    let now = Utc.with_ymd_and_hms(2026, 3, 11, 10, 0, 0).unwrap();
    store.update(|s| s.record_dispatch(2, now)).unwrap();
    store.update(|s| s.pause("deacon", now)).unwrap();

    let state = store.load().unwrap();
    assert_eq!(state.last_dispatch_count, 2);
    assert!(state.paused);
    assert_eq!(state.paused_by, "deacon");
}

#[test]
fn corrupt_file_is_an_error() {
    let (_tmp, store) = store();
    std::fs::create_dir_all(store.path.parent().unwrap()).unwrap();
    std::fs::write(&store.path, b"<html>").unwrap();
    assert!(matches!(store.load(), Err(StoreError::Corrupt { .. })));
}
