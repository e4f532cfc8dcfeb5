// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Queue anomaly detection.
//!
//! The patrol reports facts; severity classification is left to the
//! consuming agent.

use super::ready::{parse_mr, MERGE_REQUEST_LABEL};
use super::{Engineer, RefineryError};
use crate::refinery::gates::GateRunner;
use chrono::{DateTime, Utc};
use dk_adapters::{BeadQuery, GitAdapter, MailAdapter, Tracker};
use dk_core::{AnomalyKind, Clock, QueueAnomaly};

impl<T, G, R, M, C> Engineer<T, G, R, M, C>
where
    T: Tracker,
    G: GitAdapter,
    R: GateRunner,
    M: MailAdapter,
    C: Clock,
{
    /// Scan all open MRs for stale claims and orphaned branches.
    pub async fn list_queue_anomalies(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<QueueAnomaly>, RefineryError> {
        let beads = self
            .tracker
            .list(BeadQuery::open_with_label(MERGE_REQUEST_LABEL))
            .await?;

        let mut anomalies = Vec::new();
        for bead in beads {
            let mr = match parse_mr(&bead) {
                Ok(mr) => mr,
                Err(err) => {
                    tracing::warn!(mr = %bead.id, error = %err, "unreadable merge request in patrol");
                    continue;
                }
            };

            if !mr.assignee.is_empty() {
                let age = now
                    .signed_duration_since(mr.updated_at)
                    .to_std()
                    .unwrap_or_default();
                if age >= self.config.warn_after {
                    anomalies.push(QueueAnomaly {
                        mr: mr.id.clone(),
                        kind: AnomalyKind::StaleClaim,
                        age: Some(age),
                        detail: format!(
                            "claimed by {} with no update for {}",
                            mr.assignee,
                            dk_core::format_elapsed(age)
                        ),
                    });
                }
            }

            let exists_local = self.git.branch_exists_local(&mr.branch).await?;
            let exists_remote = self.git.branch_exists_remote(&mr.branch).await?;
            if !exists_local && !exists_remote {
                anomalies.push(QueueAnomaly {
                    mr: mr.id.clone(),
                    kind: AnomalyKind::OrphanedBranch,
                    age: None,
                    detail: format!("branch {} exists neither locally nor on origin", mr.branch),
                });
            }
        }
        Ok(anomalies)
    }
}

#[cfg(test)]
#[path = "anomaly_tests.rs"]
mod tests;
