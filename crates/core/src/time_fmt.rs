// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Short human-readable durations for status output.
//!
//! Anomaly ages and alarm listings want a glanceable magnitude, not a
//! precise timestamp: `"5s"`, `"2m"`, `"1h30m"`, `"3d"`.

use std::time::Duration;

/// Format an elapsed duration at the coarsest readable unit.
///
/// Minutes are appended in the hours range when non-zero (`"1h"` vs
/// `"1h5m"`); beyond a day only whole days are shown.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    match secs {
        0..=59 => format!("{}s", secs),
        60..=3_599 => format!("{}m", secs / 60),
        3_600..=86_399 => match (secs / 3_600, (secs % 3_600) / 60) {
            (hours, 0) => format!("{}h", hours),
            (hours, minutes) => format!("{}h{}m", hours, minutes),
        },
        _ => format!("{}d", secs / 86_400),
    }
}

/// Format the time until a future event, where the event may already be
/// overdue (a due alarm the fire loop has not reached yet).
pub fn format_countdown(seconds_until: i64) -> String {
    if seconds_until <= 0 {
        return "now".to_string();
    }
    format_elapsed(Duration::from_secs(seconds_until as u64))
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
