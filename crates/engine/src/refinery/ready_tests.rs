// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

use super::*;
use crate::refinery::gates::FakeGateRunner;
use crate::refinery::Engineer;
use dk_adapters::{FakeGit, FakeMail, FakeTracker};
use dk_core::{BeadStatus, FakeClock, RefineryConfig};

type TestEngineer = Engineer<FakeTracker, FakeGit, FakeGateRunner, FakeMail, FakeClock>;

struct Fixture {
    tracker: FakeTracker,
    git: FakeGit,
    clock: FakeClock,
    engineer: TestEngineer,
}

fn fixture() -> Fixture {
    fixture_with_config(RefineryConfig::default())
}

fn fixture_with_config(config: RefineryConfig) -> Fixture {
    let tracker = FakeTracker::new();
    let git = FakeGit::new();
    let clock = FakeClock::at_epoch();
    tracker.set_now(clock.now());
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

fn mr_description(branch: &str) -> String {
    serde_json::to_string(&MrFields {
        branch: branch.to_string(),
        target_branch: "main".to_string(),
        rig: "alpha".to_string(),
        source_issue: Some("gt-42".to_string()),
        worker: "alpha/polecats/nux".to_string(),
        retry_count: 0,
        parent_agent_bead: None,
        convoy_id: None,
        convoy_at: None,
        merge_sha: None,
    })
    .unwrap()
}

fn mr_bead(fx: &Fixture, id: &str, branch: &str, priority: i64) -> Bead {
    Bead {
        id: BeadId::new(id),
        title: format!("merge {}", branch),
        kind: "merge-request".to_string(),
        status: BeadStatus::Open,
        priority,
        description: mr_description(branch),
        labels: vec![MERGE_REQUEST_LABEL.to_string()],
        assignee: String::new(),
        created_at: fx.clock.now(),
        updated_at: fx.clock.now(),
        blocked_by: Vec::new(),
    }
}

#[test]
fn parse_mr_maps_bead_and_description() {
    let fx = fixture();
    let bead = mr_bead(&fx, "mr-1", "polecat/gt-42", 2);
    let mr = parse_mr(&bead).unwrap();

    assert_eq!(mr.id, "mr-1");
    assert_eq!(mr.branch, "polecat/gt-42");
    assert_eq!(mr.target_branch, "main");
    assert_eq!(mr.rig, "alpha");
    assert_eq!(mr.source_issue.as_ref().unwrap(), "gt-42");
    assert_eq!(mr.worker, "alpha/polecats/nux");
    assert_eq!(mr.priority, 2);
    assert!(!mr.branch_exists_local);
}

#[test]
fn parse_mr_rejects_non_json_descriptions() {
    let fx = fixture();
    let mut bead = mr_bead(&fx, "mr-1", "b", 2);
    bead.description = "free text".to_string();
    assert!(matches!(parse_mr(&bead), Err(RefineryError::BadMr(_))));
}

#[tokio::test]
async fn ready_set_sorts_by_priority_then_age() {
    let fx = fixture();
    fx.tracker.insert(mr_bead(&fx, "mr-low", "b1", 3));
    fx.tracker.insert(mr_bead(&fx, "mr-high", "b2", 0));
    fx.tracker.insert(mr_bead(&fx, "mr-mid", "b3", 2));

    let ready = fx.engineer.ready_mrs().await.unwrap();
    let ids: Vec<&str> = ready.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["mr-high", "mr-mid", "mr-low"]);
}

#[tokio::test]
async fn blocked_mrs_are_dropped() {
    let fx = fixture();
    let mut blocked = mr_bead(&fx, "mr-blocked", "b1", 1);
    blocked.blocked_by = vec![BeadId::new("task-1")];
    fx.tracker.insert(blocked);
    fx.tracker.insert(mr_bead(&fx, "mr-free", "b2", 2));

    let ready = fx.engineer.ready_mrs().await.unwrap();
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].id, "mr-free");
}

#[tokio::test]
async fn opt_out_label_is_honored() {
    let fx = fixture();
    let mut held = mr_bead(&fx, "mr-held", "b1", 1);
    held.labels.push(MERGE_OPT_OUT_LABEL.to_string());
    fx.tracker.insert(held);

    assert!(fx.engineer.ready_mrs().await.unwrap().is_empty());
}

#[tokio::test]
async fn fresh_claims_are_respected_and_stale_ones_recycled() {
    let fx = fixture();
    let mut fresh = mr_bead(&fx, "mr-fresh", "b1", 1);
    fresh.assignee = "other-worker".to_string();
    fx.tracker.insert(fresh);

    let mut stale = mr_bead(&fx, "mr-stale", "b2", 2);
    stale.assignee = "crashed-worker".to_string();
    stale.updated_at = fx.clock.now() - chrono::Duration::hours(2);
    fx.tracker.insert(stale);

    let ready = fx.engineer.ready_mrs().await.unwrap();
    let ids: Vec<&str> = ready.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["mr-stale"]);
}

#[tokio::test]
async fn branch_existence_is_probed() {
    let fx = fixture();
    fx.git.add_local_branch("local-only");
    fx.git.add_remote_branch("remote-only");
    fx.tracker.insert(mr_bead(&fx, "mr-l", "local-only", 1));
    fx.tracker.insert(mr_bead(&fx, "mr-r", "remote-only", 2));

    let ready = fx.engineer.ready_mrs().await.unwrap();
    assert!(ready[0].branch_exists_local && !ready[0].branch_exists_remote);
    assert!(!ready[1].branch_exists_local && ready[1].branch_exists_remote);
}
