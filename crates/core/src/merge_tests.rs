// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

use super::*;
use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 11, 12, 0, 0).unwrap()
}

fn mr(assignee: &str, updated_hours_ago: i64) -> MrInfo {
    MrInfo {
        id: BeadId::new("gt-mr-1"),
        branch: "polecat/gt-42".to_string(),
        target_branch: "main".to_string(),
        source_issue: Some(BeadId::new("gt-42")),
        worker: "alpha/polecats/furiosa".to_string(),
        rig: "alpha".to_string(),
        title: "merge gt-42".to_string(),
        priority: 2,
        parent_agent_bead: None,
        retry_count: 0,
        convoy_id: None,
        convoy_at: None,
        assignee: assignee.to_string(),
        created_at: now() - chrono::Duration::hours(updated_hours_ago + 1),
        updated_at: now() - chrono::Duration::hours(updated_hours_ago),
        branch_exists_local: true,
        branch_exists_remote: false,
    }
}

#[test]
fn claim_staleness_requires_an_assignee() {
    let timeout = Duration::from_secs(1800);
    assert!(!mr("", 5).claim_is_stale(now(), timeout));
    assert!(mr("refinery-1", 5).claim_is_stale(now(), timeout));
    assert!(!mr("refinery-1", 0).claim_is_stale(now(), timeout));
}

#[test]
fn effective_gates_sorted_by_name() {
    let config = RefineryConfig {
        gates: vec![
            GateDef {
                name: "unit".to_string(),
                run: "cargo test".to_string(),
                timeout: None,
            },
            GateDef {
                name: "build".to_string(),
                run: "cargo build".to_string(),
                timeout: Some(Duration::from_secs(600)),
            },
        ],
        ..Default::default()
    };
    let gates = config.effective_gates();
    assert_eq!(gates[0].name, "build");
    assert_eq!(gates[1].name, "unit");
}

#[test]
fn legacy_test_command_becomes_a_gate() {
    let config = RefineryConfig {
        test_command: Some("make check".to_string()),
        ..Default::default()
    };
    let gates = config.effective_gates();
    assert_eq!(gates.len(), 1);
    assert_eq!(gates[0].name, "tests");
    assert_eq!(gates[0].run, "make check");
}

#[test]
fn named_gates_win_over_legacy_command() {
    let config = RefineryConfig {
        test_command: Some("make check".to_string()),
        gates: vec![GateDef {
            name: "lint".to_string(),
            run: "cargo clippy".to_string(),
            timeout: None,
        }],
        ..Default::default()
    };
    assert_eq!(config.effective_gates().len(), 1);
    assert_eq!(config.effective_gates()[0].name, "lint");
}

#[test]
fn no_gates_configured_means_empty() {
    assert!(RefineryConfig::default().effective_gates().is_empty());
}

#[yare::parameterized(
    below_warning    = { 1, false },
    between_tiers    = { 3, false },
    at_critical      = { 6, true },
    beyond_critical  = { 7, true },
)]
fn staleness_tiers(age_hours: u64, critical: bool) {
    let config = RefineryConfig {
        warn_after: Duration::from_secs(2 * 3600),
        critical_after: Duration::from_secs(6 * 3600),
        ..Default::default()
    };
    assert_eq!(
        config.staleness_exceeds_critical(Duration::from_secs(age_hours * 3600)),
        critical
    );
}

#[test]
fn refinery_config_roundtrips_through_json() {
    let config = RefineryConfig {
        parallel_gates: true,
        delete_merged_branches: true,
        gates: vec![GateDef {
            name: "unit".to_string(),
            run: "cargo test".to_string(),
            timeout: Some(Duration::from_secs(120)),
        }],
        ..Default::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    let back: RefineryConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn anomaly_serializes_kebab_case() {
    let anomaly = QueueAnomaly {
        mr: BeadId::new("gt-mr-1"),
        kind: AnomalyKind::StaleClaim,
        age: Some(Duration::from_secs(3 * 3600)),
        detail: "claimed by refinery-1".to_string(),
    };
    let json = serde_json::to_string(&anomaly).unwrap();
    assert!(json.contains("\"stale-claim\""));
}
