// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Tracker record vocabulary.
//!
//! The bead store is an external collaborator; these types are the shape of
//! what it hands back. Everything the control plane stores on the tracker
//! (sling contexts, merge requests, resolution tasks, the merge slot) is a
//! bead with labels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Identifier of a record in the bead store.
    pub struct BeadId;
}

/// Lifecycle status of a bead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeadStatus {
    Open,
    Closed,
}

impl BeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BeadStatus::Open => "open",
            BeadStatus::Closed => "closed",
        }
    }
}

/// A record in the bead store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bead {
    pub id: BeadId,
    pub title: String,
    /// Record kind ("task", "merge-request", ...). Opaque to the core.
    #[serde(default)]
    pub kind: String,
    pub status: BeadStatus,
    /// Lower is more urgent.
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub assignee: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Ids of open beads this bead is blocked by.
    #[serde(default)]
    pub blocked_by: Vec<BeadId>,
}

impl Bead {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn is_open(&self) -> bool {
        self.status == BeadStatus::Open
    }
}

/// Fields for creating a bead.
#[derive(Debug, Clone, Default)]
pub struct NewBead {
    pub title: String,
    pub kind: String,
    pub priority: i64,
    pub description: String,
    pub actor: String,
    pub labels: Vec<String>,
    /// Ephemeral beads are scheduler-private bookkeeping and excluded from
    /// normal listings.
    pub ephemeral: bool,
}

#[cfg(test)]
#[path = "bead_tests.rs"]
mod tests;
