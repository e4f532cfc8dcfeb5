// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

use super::*;
use async_trait::async_trait;
use dk_core::{FakeClock, PendingBead, PlanReason};
use dk_engine::CycleConfig;
use dk_storage::RuntimeDir;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Clone, Default)]
struct CountingHooks {
    executed: Arc<Mutex<usize>>,
}

#[async_trait]
impl DispatchHooks for CountingHooks {
    async fn available_capacity(&self) -> Result<i64, DispatchError> {
        Ok(10)
    }

    async fn query_pending(&self) -> Result<Vec<PendingBead>, DispatchError> {
        Ok(vec![PendingBead {
            sling_id: dk_core::BeadId::new("sling-1"),
            work_id: dk_core::BeadId::new("work-1"),
            ctx: None,
        }])
    }

    async fn execute(&self, _item: &PendingBead) -> Result<(), DispatchError> {
        *self.executed.lock() += 1;
        Ok(())
    }

    async fn on_success(&self, _item: &PendingBead) -> Result<(), DispatchError> {
        Ok(())
    }
}

fn state_store(tmp: &tempfile::TempDir) -> SchedulerStateStore {
    SchedulerStateStore::new(&RuntimeDir::new(tmp.path()))
}

#[tokio::test(start_paused = true)]
async fn dispatch_tick_runs_and_records() {
    let tmp = tempfile::tempdir().unwrap();
    let store = state_store(&tmp);
    let clock = FakeClock::at_epoch();
    let hooks = CountingHooks::default();
    let cycle = DispatchCycle::new(hooks.clone(), CycleConfig::default());

    let report = dispatch_tick(&cycle, &store, &clock).await.unwrap().unwrap();
    assert_eq!(report.dispatched, 1);
    assert_eq!(report.reason, PlanReason::Ready);
    assert_eq!(*hooks.executed.lock(), 1);

    let state = store.load().unwrap();
    assert_eq!(state.last_dispatch_count, 1);
    assert_eq!(state.last_dispatch_at, Some(clock.now()));
}

#[tokio::test(start_paused = true)]
async fn paused_scheduler_skips_the_cycle() {
    let tmp = tempfile::tempdir().unwrap();
    let store = state_store(&tmp);
    let clock = FakeClock::at_epoch();
    store
        .update(|s| s.pause("mayor", clock.now()))
        .unwrap();

    let hooks = CountingHooks::default();
    let cycle = DispatchCycle::new(hooks.clone(), CycleConfig::default());

    let report = dispatch_tick(&cycle, &store, &clock).await.unwrap();
    assert!(report.is_none());
    assert_eq!(*hooks.executed.lock(), 0);
    // Pause metadata survives untouched.
    assert_eq!(store.load().unwrap().paused_by, "mayor");
}

#[tokio::test(start_paused = true)]
async fn run_periodic_ticks_until_shutdown() {
    let (tx, rx) = watch::channel(false);
    let count = Arc::new(Mutex::new(0));
    let task_count = Arc::clone(&count);

    let task = tokio::spawn(run_periodic(
        "test",
        Duration::from_secs(1),
        rx,
        move || {
            let count = Arc::clone(&task_count);
            async move {
                *count.lock() += 1;
            }
        },
    ));

    tokio::time::sleep(Duration::from_millis(3500)).await;
    tx.send(true).unwrap();
    task.await.unwrap();

    // First tick consumed at start; ticks at 1s, 2s, 3s.
    assert_eq!(*count.lock(), 3);
}

#[tokio::test(start_paused = true)]
async fn run_periodic_stops_when_sender_drops() {
    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn(run_periodic("test", Duration::from_secs(60), rx, || async {}));
    drop(tx);
    task.await.unwrap();
}
