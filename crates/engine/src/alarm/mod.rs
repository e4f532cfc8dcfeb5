// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! The alarm fire loop.
//!
//! Persistence and schedule math live in `dk-storage` and `dk-core`; this
//! module only decides what fires and applies the outcome. Delivery is a
//! callback so the engine does not depend on the supervisor.

use dk_storage::{AlarmStore, StoreError};
use dk_core::Clock;
use std::future::Future;

/// Summary of one fire pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FireReport {
    pub fired: usize,
    pub failed: usize,
}

/// Fires due alarms through a nudge callback.
pub struct AlarmEngine<C: Clock> {
    store: AlarmStore,
    clock: C,
}

impl<C: Clock> AlarmEngine<C> {
    pub fn new(store: AlarmStore, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &AlarmStore {
        &self.store
    }

    /// Fire everything due.
    ///
    /// The alarm id is prepended to the message so the receiving agent can
    /// cancel or inspect the alarm. Success advances the alarm (one-shots
    /// are deleted); failure records bounded backoff and keeps it.
    pub async fn fire_due<F, Fut>(&self, nudge: F) -> Result<FireReport, StoreError>
    where
        F: Fn(String, String) -> Fut,
        Fut: Future<Output = Result<(), String>>,
    {
        let now = self.clock.now();
        let mut report = FireReport::default();

        for mut alarm in self.store.due(now)? {
            let message = format!("[alarm {}] {}", alarm.id, alarm.message);
            match nudge(alarm.target.clone(), message).await {
                Ok(()) => {
                    alarm.advance(now);
                    report.fired += 1;
                    if alarm.recurring {
                        tracing::info!(alarm = %alarm.id, next = %alarm.next_fire_at, "alarm fired");
                        self.store.save(&alarm)?;
                    } else {
                        tracing::info!(alarm = %alarm.id, "one-shot alarm fired, removing");
                        self.store.remove(alarm.id.as_str())?;
                    }
                }
                Err(error) => {
                    alarm.record_failure(now, &error);
                    report.failed += 1;
                    tracing::warn!(
                        alarm = %alarm.id,
                        error = %error,
                        fail_count = alarm.fail_count,
                        retry_at = %alarm.next_fire_at,
                        "alarm fire failed, backing off"
                    );
                    self.store.save(&alarm)?;
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
