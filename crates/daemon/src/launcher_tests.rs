// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

use super::*;
use dk_adapters::{FakeMux, FakeNotifyAdapter, FakeProcessTable, FakeTracker};
use dk_core::{FakeClock, SchedulerConfig, SlingContext};
use dk_engine::supervisor::SupervisorConfig;

type TestHooks = TownHooks<FakeMux, FakeProcessTable, FakeClock, FakeTracker, FakeNotifyAdapter>;

struct Fixture {
    mux: FakeMux,
    tracker: FakeTracker,
    notify: FakeNotifyAdapter,
    sling: SlingStore<FakeTracker>,
    hooks: TestHooks,
    _tmp: tempfile::TempDir,
}

fn fixture(max_polecats: Option<i64>) -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let mux = FakeMux::new();
    let tracker = FakeTracker::new();
    let notify = FakeNotifyAdapter::new();
    let clock = FakeClock::at_epoch();
    tracker.set_now(clock.now());
    let supervisor = Supervisor::new(
        mux.clone(),
        FakeProcessTable::new(),
        clock,
        SupervisorConfig::default(),
    );
    let sling = SlingStore::new(tracker.clone(), "gastown/mayor");
    let config = Arc::new(TownConfig {
        scheduler: SchedulerConfig {
            max_polecats,
            ..Default::default()
        },
        ..Default::default()
    });
    let hooks = TownHooks::new(
        supervisor,
        sling.clone(),
        tracker.clone(),
        notify.clone(),
        config,
        tmp.path().to_path_buf(),
    );
    Fixture {
        mux,
        tracker,
        notify,
        sling,
        hooks,
        _tmp: tmp,
    }
}

async fn enqueue(fx: &Fixture, work: &str) -> PendingBead {
    // The work bead itself, then its sling context.
    let bead = fx
        .tracker
        .create(dk_core::NewBead {
            title: work.to_string(),
            kind: "task".to_string(),
            priority: 2,
            description: String::new(),
            actor: "test".to_string(),
            labels: Vec::new(),
            ephemeral: false,
        })
        .await
        .unwrap();

    let ctx = SlingContext::new(bead.id.as_str(), "alpha", "mol-polecat");
    let sling_id = fx.sling.create(&ctx).await.unwrap();
    PendingBead {
        sling_id,
        work_id: bead.id,
        ctx: Some(ctx),
    }
}

#[tokio::test(start_paused = true)]
async fn capacity_subtracts_live_polecats() {
    let fx = fixture(Some(3));
    fx.mux
        .add_session("alpha-polecat-gt-1")
        .add_session("alpha-polecat-gt-2")
        .add_session("alpha-witness");

    // Only polecat sessions count against capacity.
    assert_eq!(fx.hooks.available_capacity().await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn disabled_scheduler_reports_zero_capacity() {
    assert_eq!(fixture(None).hooks.available_capacity().await.unwrap(), 0);
    assert_eq!(
        fixture(Some(0)).hooks.available_capacity().await.unwrap(),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn pending_excludes_blocked_work() {
    let fx = fixture(Some(3));
    let free = enqueue(&fx, "free-work").await;
    let blocked = enqueue(&fx, "blocked-work").await;
    let blocker = fx
        .tracker
        .create(dk_core::NewBead {
            title: "blocker".to_string(),
            kind: "task".to_string(),
            priority: 1,
            description: String::new(),
            actor: "test".to_string(),
            labels: Vec::new(),
            ephemeral: false,
        })
        .await
        .unwrap();
    fx.tracker
        .add_dependency(&blocker.id, &blocked.work_id)
        .await
        .unwrap();

    let pending = fx.hooks.query_pending().await.unwrap();
    let ids: Vec<&str> = pending.iter().map(|p| p.work_id.as_str()).collect();
    assert_eq!(ids, [free.work_id.as_str()]);
}

#[tokio::test(start_paused = true)]
async fn circuit_broken_items_are_quarantined_at_query() {
    let fx = fixture(Some(3));
    let item = enqueue(&fx, "doomed").await;
    let mut ctx = item.ctx.clone().unwrap();
    ctx.dispatch_failures = 3;
    fx.sling.update(&item.sling_id, &ctx).await.unwrap();

    let pending = fx.hooks.query_pending().await.unwrap();
    assert!(pending.is_empty());
    assert_eq!(
        fx.tracker.close_reason(item.sling_id.as_str()).as_deref(),
        Some("quarantined")
    );
    assert_eq!(fx.notify.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn execute_launches_a_session_with_work_env() {
    let fx = fixture(Some(3));
    let item = enqueue(&fx, "the-work").await;

    fx.hooks.execute(&item).await.unwrap();

    let session_name = format!("alpha-polecat-{}", item.work_id);
    let session = fx.mux.get_session(&session_name).unwrap();
    assert_eq!(
        session.env.get(ENV_WORK_BEAD).map(String::as_str),
        Some(item.work_id.as_str())
    );
    assert_eq!(session.env.get(ENV_RIG).map(String::as_str), Some("alpha"));
}

#[tokio::test(start_paused = true)]
async fn execute_tolerates_an_already_healthy_session() {
    let fx = fixture(Some(3));
    let item = enqueue(&fx, "the-work").await;
    let session_name = format!("alpha-polecat-{}", item.work_id);
    fx.mux.add_session(&session_name);
    fx.mux.set_pane_command(&session_name, 0, "claude");

    fx.hooks.execute(&item).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn on_success_closes_the_sling_context() {
    let fx = fixture(Some(3));
    let item = enqueue(&fx, "the-work").await;

    fx.hooks.on_success(&item).await.unwrap();
    assert_eq!(
        fx.tracker.close_reason(item.sling_id.as_str()).as_deref(),
        Some("dispatched")
    );
}

#[tokio::test(start_paused = true)]
async fn launch_failures_accumulate_then_quarantine() {
    let fx = fixture(Some(3));
    let item = enqueue(&fx, "the-work").await;
    let err = DispatchError::Launch("tmux spawn failed".to_string());

    // Two failures: counted, still open.
    fx.hooks.on_failure(&item, &err).await;
    let item = fx.sling.find_open_by_work_id(item.work_id.as_str()).await.unwrap().unwrap();
    fx.hooks.on_failure(&item, &err).await;

    let item = fx.sling.find_open_by_work_id(item.work_id.as_str()).await.unwrap().unwrap();
    assert_eq!(item.ctx.as_ref().unwrap().dispatch_failures, 2);

    // Third failure trips the breaker.
    fx.hooks.on_failure(&item, &err).await;
    assert_eq!(
        fx.tracker.close_reason(item.sling_id.as_str()).as_deref(),
        Some("quarantined")
    );
}

#[tokio::test(start_paused = true)]
async fn commit_failures_never_quarantine() {
    let fx = fixture(Some(3));
    let item = enqueue(&fx, "the-work").await;
    let err = DispatchError::CommitFailed(Box::new(DispatchError::Launch("x".to_string())));

    fx.hooks.on_failure(&item, &err).await;

    // Still open: the agent is running and a human (or the next cycle's
    // idempotent close) settles it.
    assert!(fx.tracker.close_reason(item.sling_id.as_str()).is_none());
    assert!(fx.notify.calls().is_empty());
}
