// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Background loop plumbing.
//!
//! Four loops run inside the control plane: the dispatch ticker, the
//! refinery poll, the alarm fire loop, and the session-health patrol. Each
//! is a [`run_periodic`] task honoring the shared shutdown signal.

use dk_core::Clock;
use dk_engine::{CycleReport, DispatchCycle, DispatchError, DispatchHooks};
use dk_storage::SchedulerStateStore;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

/// Run `tick` every `period` until the shutdown signal flips to true.
pub async fn run_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut tick: F,
) where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = ()> + Send,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick of a tokio interval fires immediately; consume it so
    // loops start one period after boot.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => tick().await,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    tracing::info!(task = name, "background loop stopped");
}

/// One dispatch tick: honor the pause flag, run the cycle, record metrics.
///
/// Returns `None` when the scheduler is paused.
pub async fn dispatch_tick<H, C>(
    cycle: &DispatchCycle<H>,
    state_store: &SchedulerStateStore,
    clock: &C,
) -> Result<Option<CycleReport>, DispatchError>
where
    H: DispatchHooks,
    C: Clock,
{
    // The pause flag is re-read before every cycle; an operator pause
    // takes effect at the next tick.
    let paused = match state_store.load() {
        Ok(state) => state.paused,
        Err(err) => {
            tracing::warn!(error = %err, "scheduler state unreadable, treating as running");
            false
        }
    };
    if paused {
        tracing::debug!("scheduler paused, skipping dispatch cycle");
        return Ok(None);
    }

    let report = cycle.run().await?;
    if report.dispatched > 0 || report.failed > 0 {
        tracing::info!(
            dispatched = report.dispatched,
            failed = report.failed,
            skipped = report.skipped,
            reason = report.reason.as_str(),
            "dispatch cycle complete"
        );
    }

    let now = clock.now();
    let count = report.dispatched;
    if let Err(err) = state_store.update(|s| s.record_dispatch(count, now)) {
        tracing::warn!(error = %err, "dispatch metrics not recorded");
    }
    Ok(Some(report))
}

#[cfg(test)]
#[path = "loops_tests.rs"]
mod tests;
