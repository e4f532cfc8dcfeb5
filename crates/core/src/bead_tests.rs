// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

use super::*;

fn bead(labels: &[&str], status: BeadStatus) -> Bead {
    Bead {
        id: BeadId::new("bd-1"),
        title: "a bead".to_string(),
        kind: "task".to_string(),
        status,
        priority: 2,
        description: String::new(),
        labels: labels.iter().map(|s| s.to_string()).collect(),
        assignee: String::new(),
        created_at: Default::default(),
        updated_at: Default::default(),
        blocked_by: Vec::new(),
    }
}

#[test]
fn has_label_matches_exactly() {
    let b = bead(&["scheduler:sling-context", "rig:alpha"], BeadStatus::Open);
    assert!(b.has_label("rig:alpha"));
    assert!(!b.has_label("rig"));
}

#[test]
fn is_open_follows_status() {
    assert!(bead(&[], BeadStatus::Open).is_open());
    assert!(!bead(&[], BeadStatus::Closed).is_open());
}

#[test]
fn status_serializes_lowercase() {
    assert_eq!(
        serde_json::to_string(&BeadStatus::Open).unwrap(),
        "\"open\""
    );
    assert_eq!(BeadStatus::Closed.as_str(), "closed");
}

#[test]
fn bead_deserializes_with_missing_optional_fields() {
    let json = r#"{
        "id": "bd-9",
        "title": "minimal",
        "status": "open",
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:00:00Z"
    }"#;
    let b: Bead = serde_json::from_str(json).unwrap();
    assert_eq!(b.id, "bd-9");
    assert!(b.labels.is_empty());
    assert_eq!(b.priority, 0);
    assert!(b.blocked_by.is_empty());
}
