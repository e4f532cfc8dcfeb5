// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! The capacity-controlled dispatch cycle.
//!
//! The loop is deliberately ignorant of agents, rigs, and the tracker: all
//! domain knowledge lives in the [`DispatchHooks`] callbacks. The one piece
//! of semantics owned here is the exactly-once transition from "enqueued"
//! to "dispatched".

mod sling_store;

pub use sling_store::SlingStore;

use async_trait::async_trait;
use dk_adapters::TrackerError;
use dk_core::{plan_dispatch, DispatchPlan, PendingBead};
use std::time::Duration;
use thiserror::Error;

/// Commit retries after a successful launch, and their backoff.
const COMMIT_ATTEMPTS: usize = 3;
const COMMIT_BACKOFF: [Duration; 2] = [Duration::from_millis(500), Duration::from_secs(1)];

/// Errors from the dispatch cycle
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error("launch failed: {0}")]
    Launch(String),
    #[error("capacity probe failed: {0}")]
    Capacity(String),
    /// The agent was launched but the sling context could not be closed.
    /// Left open it would double-dispatch next cycle, so the item counts
    /// as failed and callers must distinguish "agent leaked" from "agent
    /// never launched".
    #[error("dispatch succeeded but commit failed")]
    CommitFailed(#[source] Box<DispatchError>),
}

impl DispatchError {
    /// Whether this is the dispatched-but-uncommitted sentinel.
    pub fn is_commit_failure(&self) -> bool {
        matches!(self, DispatchError::CommitFailed(_))
    }
}

/// Domain callbacks driving one dispatch cycle.
#[async_trait]
pub trait DispatchHooks: Send + Sync {
    /// How many more agents may be launched right now.
    async fn available_capacity(&self) -> Result<i64, DispatchError>;

    /// Scheduled items, in dispatch order, already readiness-filtered.
    async fn query_pending(&self) -> Result<Vec<PendingBead>, DispatchError>;

    /// Launch an agent for the item.
    async fn execute(&self, item: &PendingBead) -> Result<(), DispatchError>;

    /// Commit the transition (close the sling context).
    async fn on_success(&self, item: &PendingBead) -> Result<(), DispatchError>;

    /// Observe a failure; never fails itself.
    async fn on_failure(&self, _item: &PendingBead, _error: &DispatchError) {}
}

/// Cycle tuning.
#[derive(Debug, Clone)]
pub struct CycleConfig {
    pub batch_size: usize,
    /// Pause between launches, skipped after the last; avoids lock
    /// contention in the underlying storage.
    pub spawn_delay: Duration,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            spawn_delay: Duration::from_secs(2),
        }
    }
}

/// Result of one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub dispatched: usize,
    pub failed: usize,
    pub skipped: usize,
    pub reason: dk_core::PlanReason,
}

/// One dispatch cycle: query -> plan -> execute -> commit.
pub struct DispatchCycle<H: DispatchHooks> {
    hooks: H,
    config: CycleConfig,
}

impl<H: DispatchHooks> DispatchCycle<H> {
    pub fn new(hooks: H, config: CycleConfig) -> Self {
        Self { hooks, config }
    }

    /// Compose the callbacks through the pure planner.
    pub async fn plan(&self) -> Result<DispatchPlan, DispatchError> {
        let ready = self.hooks.query_pending().await?;
        let available = self.hooks.available_capacity().await?;
        Ok(plan_dispatch(available, self.config.batch_size, ready))
    }

    /// Execute the plan in order.
    ///
    /// An item only counts as dispatched once `on_success` has committed
    /// the transition; a launch whose commit fails after all retries is
    /// reported as failed with the commit-failed sentinel.
    pub async fn run(&self) -> Result<CycleReport, DispatchError> {
        let plan = self.plan().await?;
        let total = plan.to_dispatch.len();
        let mut dispatched = 0;
        let mut failed = 0;

        for (index, item) in plan.to_dispatch.iter().enumerate() {
            match self.hooks.execute(item).await {
                Ok(()) => match self.commit_with_retries(item).await {
                    Ok(()) => {
                        dispatched += 1;
                        tracing::info!(work = %item.work_id, "dispatched");
                    }
                    Err(commit_err) => {
                        failed += 1;
                        let err = DispatchError::CommitFailed(Box::new(commit_err));
                        tracing::error!(work = %item.work_id, error = %err, "agent launched but uncommitted");
                        self.hooks.on_failure(item, &err).await;
                    }
                },
                Err(err) => {
                    failed += 1;
                    tracing::warn!(work = %item.work_id, error = %err, "dispatch failed");
                    self.hooks.on_failure(item, &err).await;
                }
            }

            if index + 1 < total && !self.config.spawn_delay.is_zero() {
                tokio::time::sleep(self.config.spawn_delay).await;
            }
        }

        Ok(CycleReport {
            dispatched,
            failed,
            skipped: plan.skipped,
            reason: plan.reason,
        })
    }

    async fn commit_with_retries(&self, item: &PendingBead) -> Result<(), DispatchError> {
        let mut last_err = None;
        for attempt in 0..COMMIT_ATTEMPTS {
            match self.hooks.on_success(item).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    tracing::warn!(
                        work = %item.work_id,
                        attempt = attempt + 1,
                        error = %err,
                        "commit attempt failed"
                    );
                    last_err = Some(err);
                    if attempt < COMMIT_BACKOFF.len() {
                        tokio::time::sleep(COMMIT_BACKOFF[attempt]).await;
                    }
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| DispatchError::Launch("commit failed with no error".to_string())))
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
