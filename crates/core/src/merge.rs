// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Merge-queue vocabulary: merge requests, gates, outcomes, and the
//! refinery configuration knobs.

use crate::bead::BeadId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A merge request as extracted from its bead plus branch probes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MrInfo {
    pub id: BeadId,
    /// Source branch to merge from.
    pub branch: String,
    /// Target branch to merge into.
    pub target_branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_issue: Option<BeadId>,
    #[serde(default)]
    pub worker: String,
    pub rig: String,
    pub title: String,
    /// Lower is more urgent.
    #[serde(default)]
    pub priority: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_agent_bead: Option<BeadId>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convoy_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convoy_at: Option<DateTime<Utc>>,
    /// Current claim holder; empty when unclaimed.
    #[serde(default)]
    pub assignee: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub branch_exists_local: bool,
    #[serde(default)]
    pub branch_exists_remote: bool,
}

impl MrInfo {
    /// Whether the claim on this MR has gone stale.
    pub fn claim_is_stale(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        !self.assignee.is_empty()
            && now.signed_duration_since(self.updated_at)
                >= chrono::Duration::milliseconds(timeout.as_millis() as i64)
    }
}

/// Result of running one quality gate.
#[derive(Debug, Clone, PartialEq)]
pub struct GateResult {
    pub name: String,
    pub success: bool,
    pub error: String,
    pub elapsed: Duration,
}

/// Outcome of processing one merge request.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    Merged { sha: String },
    /// Merge conflicts; escalates via a resolution task.
    Conflict { details: String },
    /// A gate failed; the worker is notified.
    TestsFailed { gate: String, stderr: String },
    /// Push rejected; local target was reset to origin.
    PushFailed { error: String },
    /// The merge slot could not be acquired in time. Transient: the MR
    /// retries on the next poll cycle without notifying anyone.
    SlotTimeout,
    /// Another holder owns the slot for conflict resolution; try later.
    Deferred { holder: String },
}

/// Conflict handling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Create a resolution task and block the MR on it.
    #[default]
    AssignBack,
    /// Rebase the source branch automatically before retrying.
    AutoRebase,
}

/// One named quality gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDef {
    pub name: String,
    /// Shell command run in the rig checkout.
    pub run: String,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_duration_ms")]
    pub timeout: Option<Duration>,
}

/// Refinery configuration knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineryConfig {
    pub enabled: bool,
    pub on_conflict: ConflictPolicy,
    /// Legacy single test command, superseded by `gates`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_command: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub gates: Vec<GateDef>,
    pub parallel_gates: bool,
    pub delete_merged_branches: bool,
    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,
    #[serde(with = "duration_ms")]
    pub stale_claim_timeout: Duration,
    /// Stale-claim anomaly warning threshold.
    #[serde(with = "duration_ms")]
    pub warn_after: Duration,
    /// Stale-claim anomaly critical threshold.
    #[serde(with = "duration_ms")]
    pub critical_after: Duration,
    pub max_retries: u32,
    /// Command run after a merge to refresh crew checkouts. Best-effort.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crew_sync_command: Option<String>,
}

impl Default for RefineryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            on_conflict: ConflictPolicy::AssignBack,
            test_command: None,
            gates: Vec::new(),
            parallel_gates: false,
            delete_merged_branches: false,
            poll_interval: Duration::from_secs(30),
            stale_claim_timeout: Duration::from_secs(30 * 60),
            warn_after: Duration::from_secs(2 * 3600),
            critical_after: Duration::from_secs(6 * 3600),
            max_retries: 3,
            crew_sync_command: None,
        }
    }
}

impl RefineryConfig {
    /// Whether a stale claim's age has crossed the critical threshold.
    ///
    /// The anomaly scan reports ages only; consumers judge them against
    /// the configured warning/critical thresholds.
    pub fn staleness_exceeds_critical(&self, age: Duration) -> bool {
        age >= self.critical_after
    }

    /// Effective gates, sorted by name. Falls back to the legacy test
    /// command as a single gate named "tests".
    pub fn effective_gates(&self) -> Vec<GateDef> {
        if !self.gates.is_empty() {
            let mut gates = self.gates.clone();
            gates.sort_by(|a, b| a.name.cmp(&b.name));
            return gates;
        }
        match &self.test_command {
            Some(cmd) => vec![GateDef {
                name: "tests".to_string(),
                run: cmd.clone(),
                timeout: None,
            }],
            None => Vec::new(),
        }
    }
}

/// Kind of queue anomaly detected by the refinery patrol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnomalyKind {
    /// Claimed but not touched past the warning threshold.
    StaleClaim,
    /// The MR's branch exists neither locally nor on the remote.
    OrphanedBranch,
}

/// One anomaly record. Severity is left to the consuming agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueAnomaly {
    pub mr: BeadId,
    pub kind: AnomalyKind,
    /// Claim age for stale claims.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_duration_ms")]
    pub age: Option<Duration>,
    pub detail: String,
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (duration.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

mod opt_duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(v: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        v.map(|d| d.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let millis = Option::<u64>::deserialize(d)?;
        Ok(millis.map(Duration::from_millis))
    }
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod tests;
