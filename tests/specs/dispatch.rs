// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Dispatch scenarios: planning arithmetic and the exactly-once commit.

use async_trait::async_trait;
use dk_core::{plan_dispatch, BeadId, PendingBead, PlanReason};
use dk_engine::{CycleConfig, DispatchCycle, DispatchError, DispatchHooks};
use parking_lot::Mutex;
use std::sync::Arc;

fn pending(work: &str) -> PendingBead {
    PendingBead {
        sling_id: BeadId::new(format!("sling-{}", work)),
        work_id: BeadId::new(work),
        ctx: None,
    }
}

#[test]
fn plan_limits_report_the_binding_constraint() {
    let plan = plan_dispatch(2, 3, vec![pending("a"), pending("b"), pending("c"), pending("d")]);
    let ids: Vec<&str> = plan.to_dispatch.iter().map(|p| p.work_id.as_str()).collect();
    assert_eq!(ids, ["a", "b"]);
    assert_eq!(plan.skipped, 2);
    assert_eq!(plan.reason, PlanReason::Capacity);

    let plan = plan_dispatch(-1, 3, (0..10).map(|i| pending(&format!("w{i}"))).collect());
    assert!(plan.to_dispatch.is_empty());
    assert_eq!(plan.skipped, 10);
    assert_eq!(plan.reason, PlanReason::Capacity);

    let plan = plan_dispatch(100, 5, vec![pending("a"), pending("b")]);
    assert_eq!(plan.to_dispatch.len(), 2);
    assert_eq!(plan.skipped, 0);
    assert_eq!(plan.reason, PlanReason::Ready);
}

/// Hooks where every launch succeeds but item "a" can never commit.
#[derive(Clone)]
struct StuckCommitHooks {
    failures: Arc<Mutex<Vec<(String, bool, String)>>>,
}

#[async_trait]
impl DispatchHooks for StuckCommitHooks {
    async fn available_capacity(&self) -> Result<i64, DispatchError> {
        Ok(10)
    }

    async fn query_pending(&self) -> Result<Vec<PendingBead>, DispatchError> {
        Ok(vec![pending("a"), pending("b"), pending("c")])
    }

    async fn execute(&self, _item: &PendingBead) -> Result<(), DispatchError> {
        Ok(())
    }

    async fn on_success(&self, item: &PendingBead) -> Result<(), DispatchError> {
        if item.work_id == "a" {
            return Err(DispatchError::Tracker(
                dk_adapters::TrackerError::CommandFailed("tracker down".to_string()),
            ));
        }
        Ok(())
    }

    async fn on_failure(&self, item: &PendingBead, error: &DispatchError) {
        let source = std::error::Error::source(error)
            .map(|s| s.to_string())
            .unwrap_or_default();
        self.failures.lock().push((
            item.work_id.as_str().to_string(),
            error.is_commit_failure(),
            source,
        ));
    }
}

#[tokio::test(start_paused = true)]
async fn launched_but_uncommitted_items_count_as_failed() {
    let hooks = StuckCommitHooks {
        failures: Arc::new(Mutex::new(Vec::new())),
    };
    let cycle = DispatchCycle::new(
        hooks.clone(),
        CycleConfig {
            batch_size: 10,
            spawn_delay: std::time::Duration::from_millis(10),
        },
    );

    let report = cycle.run().await.unwrap();
    assert_eq!(report.dispatched, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.dispatched + report.failed, 3);

    let failures = hooks.failures.lock();
    assert_eq!(failures.len(), 1);
    let (work, is_commit_failure, source) = &failures[0];
    assert_eq!(work, "a");
    // The wrapper is the commit-failed sentinel and it unwraps to the
    // underlying tracker error.
    assert!(is_commit_failure);
    assert!(source.contains("tracker down"), "source: {}", source);
}
