// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Sling contexts: the scheduler's private per-work-item dispatch record.
//!
//! Stored on the tracker as an ephemeral bead labelled
//! [`SLING_CONTEXT_LABEL`] whose description is this struct as JSON. JSON is
//! used deliberately instead of a line-based format: the description is
//! scheduler-private, so there is no human prose to collide with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label identifying sling-context beads on the tracker.
pub const SLING_CONTEXT_LABEL: &str = "scheduler:sling-context";

/// Why a sling context was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseReason {
    /// The work item was handed to a launched agent.
    Dispatched,
    /// The item kept failing to dispatch and was pulled from the queue.
    Quarantined,
    /// An operator withdrew the item.
    Cancelled,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Dispatched => "dispatched",
            CloseReason::Quarantined => "quarantined",
            CloseReason::Cancelled => "cancelled",
        }
    }
}

/// Per-work-item scheduling record.
///
/// Invariant (enforced by the store): at most one open sling context per
/// work bead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlingContext {
    /// The work bead this context schedules.
    pub work_bead: String,
    /// Target rig the agent will run in.
    pub rig: String,
    /// Formula (agent recipe) name.
    pub formula: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, String>,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convoy_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_branch: Option<String>,
    #[serde(default)]
    pub no_merge: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_kind: Option<String>,
    #[serde(default)]
    pub owned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// How many dispatch attempts have failed so far.
    #[serde(default)]
    pub dispatch_failures: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<String>,
}

impl SlingContext {
    pub fn new(
        work_bead: impl Into<String>,
        rig: impl Into<String>,
        formula: impl Into<String>,
    ) -> Self {
        Self {
            work_bead: work_bead.into(),
            rig: rig.into(),
            formula: formula.into(),
            args: Vec::new(),
            vars: BTreeMap::new(),
            enqueued_at: DateTime::<Utc>::default(),
            merge_strategy: None,
            convoy_id: None,
            base_branch: None,
            no_merge: false,
            account: None,
            agent_kind: None,
            owned: false,
            mode: None,
            dispatch_failures: 0,
            last_failure: None,
        }
    }

    /// Serialize to the bead-description JSON blob.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a bead description back into a context.
    pub fn from_json(description: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(description)
    }

    /// Record a dispatch failure for the circuit breaker.
    pub fn note_failure(&mut self, error: &str) {
        self.dispatch_failures += 1;
        self.last_failure = Some(error.to_string());
    }
}

#[cfg(test)]
#[path = "sling_tests.rs"]
mod tests;
