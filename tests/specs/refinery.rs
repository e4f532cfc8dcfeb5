// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Merge queue scenarios over the fake tracker and fake git.

use chrono::Duration;
use dk_adapters::{FakeGit, FakeMail, FakeTracker, Tracker};
use dk_core::{
    AnomalyKind, Bead, BeadId, BeadStatus, Clock, FakeClock, MergeOutcome, RefineryConfig,
};
use dk_engine::{Engineer, FakeGateRunner};
use std::time::Duration as StdDuration;

type SpecEngineer = Engineer<FakeTracker, FakeGit, FakeGateRunner, FakeMail, FakeClock>;

struct Town {
    tracker: FakeTracker,
    git: FakeGit,
    clock: FakeClock,
    engineer: SpecEngineer,
}

fn town() -> Town {
    let tracker = FakeTracker::new();
    let git = FakeGit::new();
    let clock = FakeClock::at_epoch();
    tracker.set_now(clock.now());
    let config = RefineryConfig {
        warn_after: StdDuration::from_secs(2 * 3600),
        critical_after: StdDuration::from_secs(6 * 3600),
        ..Default::default()
    };
    let engineer = Engineer::new(
        "alpha",
        "main",
        config,
        tracker.clone(),
        git.clone(),
        FakeGateRunner::new(),
        FakeMail::new(),
        clock.clone(),
    );
    Town {
        tracker,
        git,
        clock,
        engineer,
    }
}

fn mr_bead(town: &Town, id: &str, branch: &str, assignee: &str, updated_hours_ago: i64) {
    let description = serde_json::json!({
        "branch": branch,
        "target_branch": "main",
        "rig": "alpha",
        "worker": "alpha/polecats/nux",
        "source_issue": "gt-42",
    })
    .to_string();
    town.tracker.insert(Bead {
        id: BeadId::new(id),
        title: format!("merge {}", branch),
        kind: "merge-request".to_string(),
        status: BeadStatus::Open,
        priority: 2,
        description,
        labels: vec!["refinery:merge-request".to_string()],
        assignee: assignee.to_string(),
        created_at: town.clock.now() - Duration::hours(updated_hours_ago + 1),
        updated_at: town.clock.now() - Duration::hours(updated_hours_ago),
        blocked_by: Vec::new(),
    });
}

#[tokio::test]
async fn stale_claims_are_reported_with_ages_only() {
    let town = town();
    town.git.add_local_branch("b1");
    town.git.add_local_branch("b2");
    mr_bead(&town, "gt-warn", "b1", "worker-a", 3);
    mr_bead(&town, "gt-critical", "b2", "worker-b", 7);

    let anomalies = town
        .engineer
        .list_queue_anomalies(town.clock.now())
        .await
        .unwrap();

    assert_eq!(anomalies.len(), 2);
    let warn = anomalies.iter().find(|a| a.mr == "gt-warn").unwrap();
    assert_eq!(warn.kind, AnomalyKind::StaleClaim);
    assert_eq!(warn.age, Some(StdDuration::from_secs(3 * 3600)));
    let critical = anomalies.iter().find(|a| a.mr == "gt-critical").unwrap();
    assert_eq!(critical.kind, AnomalyKind::StaleClaim);
    assert_eq!(critical.age, Some(StdDuration::from_secs(7 * 3600)));
}

#[tokio::test(start_paused = true)]
async fn a_merge_request_travels_the_whole_queue() {
    let town = town();
    town.git.add_local_branch("polecat/gt-42");
    town.git.set_head_message("polecat/gt-42", "feat: wire the pumps");
    mr_bead(&town, "mr-1", "polecat/gt-42", "", 0);
    // The source issue the merge closes.
    town.tracker.insert(Bead {
        id: BeadId::new("gt-42"),
        title: "wire the pumps".to_string(),
        kind: "task".to_string(),
        status: BeadStatus::Open,
        priority: 2,
        description: String::new(),
        labels: Vec::new(),
        assignee: String::new(),
        created_at: town.clock.now(),
        updated_at: town.clock.now(),
        blocked_by: Vec::new(),
    });

    let outcomes = town.engineer.run_once().await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0].1, MergeOutcome::Merged { .. }));

    assert_eq!(town.tracker.close_reason("mr-1").as_deref(), Some("merged"));
    assert!(town
        .tracker
        .close_reason("gt-42")
        .unwrap()
        .contains("mr-1"));
    // The slot is free again for the next cycle.
    assert_eq!(town.tracker.slot_holder("alpha"), None);
}

#[tokio::test(start_paused = true)]
async fn conflicts_block_the_mr_until_the_task_closes() {
    let town = town();
    town.git.add_local_branch("conflicted");
    town.git.set_probe_conflict("conflicted", "main");
    mr_bead(&town, "mr-1", "conflicted", "", 0);

    let outcomes = town.engineer.run_once().await.unwrap();
    assert!(matches!(outcomes[0].1, MergeOutcome::Conflict { .. }));

    // Blocked: the next cycle skips it.
    assert!(town.engineer.run_once().await.unwrap().is_empty());

    // An agent rebases the branch, resolves the conflicts, and closes the
    // task; resolution also releases the slot it held.
    let blocked = town.tracker.get("mr-1").unwrap();
    let task_id = blocked.blocked_by[0].clone();
    town.git.clear_probe_conflict("conflicted", "main");
    town.tracker.close(&task_id, "resolved").await.unwrap();
    town.tracker.set_slot_holder("alpha", None);

    let outcomes = town.engineer.run_once().await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0].1, MergeOutcome::Merged { .. }));
}
