// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

use super::*;
use crate::refinery::gates::FakeGateRunner;
use crate::refinery::ready::MrFields;
use dk_adapters::{FakeGit, FakeMail, FakeTracker};
use dk_core::{Bead, BeadId, BeadStatus, FakeClock, RefineryConfig};
use std::time::Duration;

struct Fixture {
    tracker: FakeTracker,
    git: FakeGit,
    clock: FakeClock,
    engineer: Engineer<FakeTracker, FakeGit, FakeGateRunner, FakeMail, FakeClock>,
}

fn fixture() -> Fixture {
    let tracker = FakeTracker::new();
    let git = FakeGit::new();
    let clock = FakeClock::at_epoch();
    let config = RefineryConfig {
        warn_after: Duration::from_secs(2 * 3600),
        critical_after: Duration::from_secs(6 * 3600),
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
    Fixture {
        tracker,
        git,
        clock,
        engineer,
    }
}

fn insert_mr(fx: &Fixture, id: &str, branch: &str, assignee: &str, updated_hours_ago: i64) {
    let fields = MrFields {
        branch: branch.to_string(),
        target_branch: "main".to_string(),
        rig: "alpha".to_string(),
        source_issue: None,
        worker: String::new(),
        retry_count: 0,
        parent_agent_bead: None,
        convoy_id: None,
        convoy_at: None,
        merge_sha: None,
    };
    fx.tracker.insert(Bead {
        id: BeadId::new(id),
        title: format!("merge {}", branch),
        kind: "merge-request".to_string(),
        status: BeadStatus::Open,
        priority: 2,
        description: serde_json::to_string(&fields).unwrap(),
        labels: vec![MERGE_REQUEST_LABEL.to_string()],
        assignee: assignee.to_string(),
        created_at: fx.clock.now() - chrono::Duration::hours(updated_hours_ago + 1),
        updated_at: fx.clock.now() - chrono::Duration::hours(updated_hours_ago),
        blocked_by: Vec::new(),
    });
}

#[tokio::test]
async fn stale_claims_report_age_without_severity() {
    let fx = fixture();
    fx.git.add_local_branch("b1");
    fx.git.add_local_branch("b2");
    insert_mr(&fx, "gt-warn", "b1", "worker-a", 3);
    insert_mr(&fx, "gt-critical", "b2", "worker-b", 7);

    let anomalies = fx.engineer.list_queue_anomalies(fx.clock.now()).await.unwrap();

    assert_eq!(anomalies.len(), 2);
    let warn = anomalies.iter().find(|a| a.mr == "gt-warn").unwrap();
    assert_eq!(warn.kind, AnomalyKind::StaleClaim);
    assert_eq!(warn.age, Some(Duration::from_secs(3 * 3600)));

    let critical = anomalies.iter().find(|a| a.mr == "gt-critical").unwrap();
    assert_eq!(critical.kind, AnomalyKind::StaleClaim);
    assert_eq!(critical.age, Some(Duration::from_secs(7 * 3600)));
    // Severity is the consuming agent's call; only the age is reported.
}

#[tokio::test]
async fn fresh_claims_and_unclaimed_mrs_are_quiet() {
    let fx = fixture();
    fx.git.add_local_branch("b1");
    fx.git.add_local_branch("b2");
    insert_mr(&fx, "mr-fresh", "b1", "worker-a", 1);
    insert_mr(&fx, "mr-unclaimed", "b2", "", 10);

    let anomalies = fx.engineer.list_queue_anomalies(fx.clock.now()).await.unwrap();
    assert!(anomalies.is_empty());
}

#[tokio::test]
async fn orphaned_branches_are_flagged() {
    let fx = fixture();
    // Branch exists nowhere.
    insert_mr(&fx, "mr-orphan", "vanished-branch", "", 0);
    // Remote-only branch is fine.
    fx.git.add_remote_branch("remote-branch");
    insert_mr(&fx, "mr-remote", "remote-branch", "", 0);

    let anomalies = fx.engineer.list_queue_anomalies(fx.clock.now()).await.unwrap();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].mr, "mr-orphan");
    assert_eq!(anomalies[0].kind, AnomalyKind::OrphanedBranch);
    assert!(anomalies[0].detail.contains("vanished-branch"));
}

#[tokio::test]
async fn one_mr_can_carry_both_anomalies() {
    let fx = fixture();
    insert_mr(&fx, "mr-sad", "vanished", "worker-a", 5);

    let anomalies = fx.engineer.list_queue_anomalies(fx.clock.now()).await.unwrap();
    assert_eq!(anomalies.len(), 2);
}
