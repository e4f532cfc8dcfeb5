// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

use super::*;
use dk_core::{BeadId, PlanReason};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

fn pending(work: &str) -> PendingBead {
    PendingBead {
        sling_id: BeadId::new(format!("sling-{}", work)),
        work_id: BeadId::new(work),
        ctx: None,
    }
}

/// Scriptable hooks for cycle tests.
#[derive(Clone)]
struct ScriptedHooks {
    inner: Arc<Mutex<ScriptedState>>,
}

struct ScriptedState {
    capacity: i64,
    ready: Vec<PendingBead>,
    execute_failures: Vec<String>,
    /// work id -> number of on_success calls that fail (usize::MAX = always)
    commit_failures: HashMap<String, usize>,
    executed: Vec<String>,
    committed: Vec<String>,
    failures: Vec<(String, String, bool)>,
}

impl ScriptedHooks {
    fn new(capacity: i64, ready: Vec<PendingBead>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ScriptedState {
                capacity,
                ready,
                execute_failures: Vec::new(),
                commit_failures: HashMap::new(),
                executed: Vec::new(),
                committed: Vec::new(),
                failures: Vec::new(),
            })),
        }
    }

    fn fail_execute(&self, work: &str) {
        self.inner.lock().execute_failures.push(work.to_string());
    }

    fn fail_commits(&self, work: &str, times: usize) {
        self.inner
            .lock()
            .commit_failures
            .insert(work.to_string(), times);
    }

    fn executed(&self) -> Vec<String> {
        self.inner.lock().executed.clone()
    }

    fn committed(&self) -> Vec<String> {
        self.inner.lock().committed.clone()
    }

    /// (work id, error text, is_commit_failure)
    fn failures(&self) -> Vec<(String, String, bool)> {
        self.inner.lock().failures.clone()
    }
}

#[async_trait]
impl DispatchHooks for ScriptedHooks {
    async fn available_capacity(&self) -> Result<i64, DispatchError> {
        Ok(self.inner.lock().capacity)
    }

    async fn query_pending(&self) -> Result<Vec<PendingBead>, DispatchError> {
        Ok(self.inner.lock().ready.clone())
    }

    async fn execute(&self, item: &PendingBead) -> Result<(), DispatchError> {
        let mut state = self.inner.lock();
        if state.execute_failures.contains(&item.work_id.as_str().to_string()) {
            return Err(DispatchError::Launch("tmux spawn failed".to_string()));
        }
        state.executed.push(item.work_id.as_str().to_string());
        Ok(())
    }

    async fn on_success(&self, item: &PendingBead) -> Result<(), DispatchError> {
        let mut state = self.inner.lock();
        let key = item.work_id.as_str().to_string();
        if let Some(remaining) = state.commit_failures.get_mut(&key) {
            if *remaining > 0 {
                *remaining = remaining.saturating_sub(1);
                return Err(DispatchError::Tracker(
                    dk_adapters::TrackerError::CommandFailed("tracker down".to_string()),
                ));
            }
        }
        state.committed.push(key);
        Ok(())
    }

    async fn on_failure(&self, item: &PendingBead, error: &DispatchError) {
        self.inner.lock().failures.push((
            item.work_id.as_str().to_string(),
            error.to_string(),
            error.is_commit_failure(),
        ));
    }
}

fn cycle(hooks: ScriptedHooks) -> DispatchCycle<ScriptedHooks> {
    DispatchCycle::new(
        hooks,
        CycleConfig {
            batch_size: 10,
            spawn_delay: Duration::from_millis(100),
        },
    )
}

#[tokio::test(start_paused = true)]
async fn plan_composes_hooks_through_the_pure_pipeline() {
    let hooks = ScriptedHooks::new(2, vec![pending("a"), pending("b"), pending("c")]);
    let plan = cycle(hooks).plan().await.unwrap();
    assert_eq!(plan.to_dispatch.len(), 2);
    assert_eq!(plan.reason, PlanReason::Capacity);
}

#[tokio::test(start_paused = true)]
async fn run_dispatches_in_query_order() {
    let hooks = ScriptedHooks::new(10, vec![pending("z"), pending("a"), pending("m")]);
    let report = cycle(hooks.clone()).run().await.unwrap();

    assert_eq!(report.dispatched, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(hooks.executed(), ["z", "a", "m"]);
    assert_eq!(hooks.committed(), ["z", "a", "m"]);
}

#[tokio::test(start_paused = true)]
async fn execute_failure_counts_failed_and_notifies() {
    let hooks = ScriptedHooks::new(10, vec![pending("a"), pending("b")]);
    hooks.fail_execute("a");

    let report = cycle(hooks.clone()).run().await.unwrap();
    assert_eq!(report.dispatched, 1);
    assert_eq!(report.failed, 1);

    let failures = hooks.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "a");
    // A never-launched agent is not a commit failure.
    assert!(!failures[0].2);
}

#[tokio::test(start_paused = true)]
async fn transient_commit_failure_is_retried_to_success() {
    let hooks = ScriptedHooks::new(10, vec![pending("a")]);
    hooks.fail_commits("a", 2);

    let report = cycle(hooks.clone()).run().await.unwrap();
    assert_eq!(report.dispatched, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(hooks.committed(), ["a"]);
}

#[tokio::test(start_paused = true)]
async fn permanent_commit_failure_is_failed_with_sentinel() {
    let hooks = ScriptedHooks::new(10, vec![pending("a"), pending("b"), pending("c")]);
    hooks.fail_commits("a", usize::MAX);

    let report = cycle(hooks.clone()).run().await.unwrap();
    // Never dispatched-and-failed double counting: the totals add up.
    assert_eq!(report.dispatched, 2);
    assert_eq!(report.failed, 1);

    let failures = hooks.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "a");
    assert!(failures[0].2, "wrapper must be the commit-failed sentinel");
}

#[tokio::test(start_paused = true)]
async fn commit_failed_sentinel_unwraps_to_tracker_error() {
    let underlying = DispatchError::Tracker(dk_adapters::TrackerError::CommandFailed(
        "tracker down".to_string(),
    ));
    let wrapped = DispatchError::CommitFailed(Box::new(underlying));

    assert!(wrapped.is_commit_failure());
    let source = std::error::Error::source(&wrapped).unwrap();
    assert!(source.to_string().contains("tracker down"));
}

#[tokio::test(start_paused = true)]
async fn spawn_delay_is_skipped_after_the_last_item() {
    let hooks = ScriptedHooks::new(10, vec![pending("a"), pending("b")]);
    let started = tokio::time::Instant::now();
    cycle(hooks).run().await.unwrap();
    let elapsed = started.elapsed();

    // One inter-dispatch delay plus commit time, not two delays.
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn empty_queue_is_a_quiet_cycle() {
    let hooks = ScriptedHooks::new(10, Vec::new());
    let report = cycle(hooks).run().await.unwrap();
    assert_eq!(report.dispatched + report.failed + report.skipped, 0);
    assert_eq!(report.reason, PlanReason::None);
}
