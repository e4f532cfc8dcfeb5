// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

use super::{format_countdown, format_elapsed};
use std::time::Duration;

#[yare::parameterized(
    zero_seconds     = { 0,      "0s" },
    max_seconds      = { 59,     "59s" },
    one_minute       = { 60,     "1m" },
    max_minutes      = { 3599,   "59m" },
    one_hour         = { 3600,   "1h" },
    hour_and_minutes = { 3660,   "1h1m" },
    hours_no_minutes = { 7200,   "2h" },
    almost_a_day     = { 86399,  "23h59m" },
    one_day          = { 86400,  "1d" },
    three_days       = { 259200, "3d" },
)]
fn elapsed(secs: u64, expected: &str) {
    assert_eq!(format_elapsed(Duration::from_secs(secs)), expected);
}

#[test]
fn elapsed_ignores_subsecond_precision() {
    assert_eq!(format_elapsed(Duration::from_millis(900)), "0s");
    assert_eq!(format_elapsed(Duration::from_millis(61_500)), "1m");
}

#[yare::parameterized(
    overdue      = { -120,  "now" },
    due_this_instant = { 0, "now" },
    soon         = { 45,    "45s" },
    in_minutes   = { 600,   "10m" },
    in_hours     = { 5400,  "1h30m" },
)]
fn countdown(seconds_until: i64, expected: &str) {
    assert_eq!(format_countdown(seconds_until), expected);
}
