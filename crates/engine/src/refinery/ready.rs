// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Merge request extraction and the ready set.

use super::{Engineer, RefineryError};
use crate::refinery::gates::GateRunner;
use chrono::{DateTime, Utc};
use dk_adapters::{BeadQuery, GitAdapter, MailAdapter, Tracker};
use dk_core::{Bead, BeadId, Clock, MrInfo};
use serde::{Deserialize, Serialize};

/// Label identifying merge-request beads.
pub const MERGE_REQUEST_LABEL: &str = "refinery:merge-request";

/// Opt-out label: the refinery leaves these MRs alone.
pub const MERGE_OPT_OUT_LABEL: &str = "refinery:hold";

/// Label prefix on agent beads referencing their in-flight MR.
pub const ACTIVE_MR_LABEL_PREFIX: &str = "active-mr:";

/// The MR bead's description payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MrFields {
    pub branch: String,
    pub target_branch: String,
    pub rig: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_issue: Option<String>,
    #[serde(default)]
    pub worker: String,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_agent_bead: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convoy_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convoy_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_sha: Option<String>,
}

impl MrFields {
    pub(crate) fn from_info(info: &MrInfo, merge_sha: Option<String>) -> Self {
        Self {
            branch: info.branch.clone(),
            target_branch: info.target_branch.clone(),
            rig: info.rig.clone(),
            source_issue: info.source_issue.as_ref().map(|id| id.as_str().to_string()),
            worker: info.worker.clone(),
            retry_count: info.retry_count,
            parent_agent_bead: info
                .parent_agent_bead
                .as_ref()
                .map(|id| id.as_str().to_string()),
            convoy_id: info.convoy_id.clone(),
            convoy_at: info.convoy_at,
            merge_sha,
        }
    }
}

/// Extract an [`MrInfo`] from a bead; branch-existence flags start false.
pub(crate) fn parse_mr(bead: &Bead) -> Result<MrInfo, RefineryError> {
    let fields: MrFields = serde_json::from_str(&bead.description)
        .map_err(|e| RefineryError::BadMr(format!("{}: {}", bead.id, e)))?;
    Ok(MrInfo {
        id: bead.id.clone(),
        branch: fields.branch,
        target_branch: fields.target_branch,
        source_issue: fields.source_issue.map(BeadId::new),
        worker: fields.worker,
        rig: fields.rig,
        title: bead.title.clone(),
        priority: bead.priority,
        parent_agent_bead: fields.parent_agent_bead.map(BeadId::new),
        retry_count: fields.retry_count,
        convoy_id: fields.convoy_id,
        convoy_at: fields.convoy_at,
        assignee: bead.assignee.clone(),
        created_at: bead.created_at,
        updated_at: bead.updated_at,
        branch_exists_local: false,
        branch_exists_remote: false,
    })
}

impl<T, G, R, M, C> Engineer<T, G, R, M, C>
where
    T: Tracker,
    G: GitAdapter,
    R: GateRunner,
    M: MailAdapter,
    C: Clock,
{
    /// Merge requests eligible for processing, in priority order
    /// (lower-is-higher).
    ///
    /// Drops MRs blocked by an open dependency, MRs carrying the opt-out
    /// label, and MRs already claimed by a live worker. A claim whose
    /// `updated_at` is older than the stale-claim timeout is considered
    /// abandoned and the MR re-enters the ready set.
    pub async fn ready_mrs(&self) -> Result<Vec<MrInfo>, RefineryError> {
        let now = self.clock.now();
        let beads = self
            .tracker
            .list(BeadQuery::open_with_label(MERGE_REQUEST_LABEL))
            .await?;

        let mut ready = Vec::new();
        for bead in beads {
            if !bead.blocked_by.is_empty() {
                continue;
            }
            if bead.has_label(MERGE_OPT_OUT_LABEL) {
                continue;
            }
            let mr = match parse_mr(&bead) {
                Ok(mr) => mr,
                Err(err) => {
                    tracing::warn!(mr = %bead.id, error = %err, "skipping unreadable merge request");
                    continue;
                }
            };
            if !mr.assignee.is_empty()
                && mr.assignee != self.actor
                && !mr.claim_is_stale(now, self.config.stale_claim_timeout)
            {
                continue;
            }
            ready.push(mr);
        }

        ready.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });

        // Branch probes after the cheap filters.
        for mr in &mut ready {
            mr.branch_exists_local = self.git.branch_exists_local(&mr.branch).await?;
            mr.branch_exists_remote = self.git.branch_exists_remote(&mr.branch).await?;
        }
        Ok(ready)
    }
}

#[cfg(test)]
#[path = "ready_tests.rs"]
mod tests;
