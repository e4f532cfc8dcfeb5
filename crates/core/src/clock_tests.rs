// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

use super::*;
use chrono::Duration;

#[test]
fn system_clock_is_monotonic_enough() {
    let clock = SystemClock;
    let a = clock.now();
    let b = clock.now();
    assert!(b >= a);
}

#[test]
fn fake_clock_returns_set_time() {
    let clock = FakeClock::at_epoch();
    let start = clock.now();

    clock.advance(Duration::seconds(90));
    assert_eq!(clock.now(), start + Duration::seconds(90));

    clock.set(start);
    assert_eq!(clock.now(), start);
}

#[test]
fn epoch_ms_matches_now() {
    let clock = FakeClock::at_epoch();
    assert_eq!(clock.epoch_ms(), clock.now().timestamp_millis());
}
