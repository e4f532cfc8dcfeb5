// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! The dispatch hooks for a town: how capacity is measured, how pending
//! work is gathered, and how an agent actually launches.

use crate::config::TownConfig;
use async_trait::async_trait;
use dk_adapters::{MuxAdapter, NotifyAdapter, ProcessTable, Tracker};
use dk_core::{
    blocker_aware, filter_circuit_broken, Clock, CloseReason, FailurePolicy, PendingBead,
};
use dk_engine::{DispatchError, DispatchHooks, SlingStore, Supervisor, SupervisorError};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

/// Environment injected into every agent session.
const ENV_TOWN: &str = "DERRICK_TOWN";
const ENV_RIG: &str = "DERRICK_RIG";
const ENV_WORK_BEAD: &str = "DERRICK_WORK_BEAD";

/// Dispatch hooks backed by the supervisor and the tracker.
pub struct TownHooks<M, P, C, T, N>
where
    M: MuxAdapter,
    P: ProcessTable,
    C: Clock,
    T: Tracker,
    N: NotifyAdapter,
{
    supervisor: Supervisor<M, P, C>,
    sling: SlingStore<T>,
    tracker: T,
    notify: N,
    config: Arc<TownConfig>,
    town_root: PathBuf,
    policy: FailurePolicy,
}

impl<M, P, C, T, N> TownHooks<M, P, C, T, N>
where
    M: MuxAdapter,
    P: ProcessTable,
    C: Clock,
    T: Tracker,
    N: NotifyAdapter,
{
    pub fn new(
        supervisor: Supervisor<M, P, C>,
        sling: SlingStore<T>,
        tracker: T,
        notify: N,
        config: Arc<TownConfig>,
        town_root: PathBuf,
    ) -> Self {
        let policy = FailurePolicy::CircuitBreaker {
            max_failures: config.patrol.max_dispatch_failures,
        };
        Self {
            supervisor,
            sling,
            tracker,
            notify,
            config,
            town_root,
            policy,
        }
    }

    /// Quarantine an item that has exhausted its dispatch attempts.
    async fn quarantine(&self, item: &PendingBead) {
        tracing::warn!(work = %item.work_id, sling = %item.sling_id, "quarantining work item");
        if let Err(err) = self
            .sling
            .close(&item.sling_id, CloseReason::Quarantined)
            .await
        {
            tracing::error!(sling = %item.sling_id, error = %err, "quarantine close failed");
            return;
        }
        let _ = self
            .notify
            .notify(
                "work item quarantined",
                &format!("{} kept failing to dispatch", item.work_id),
            )
            .await;
    }
}

#[async_trait]
impl<M, P, C, T, N> DispatchHooks for TownHooks<M, P, C, T, N>
where
    M: MuxAdapter,
    P: ProcessTable,
    C: Clock,
    T: Tracker,
    N: NotifyAdapter,
{
    async fn available_capacity(&self) -> Result<i64, DispatchError> {
        let max = self.config.scheduler.max_polecats.unwrap_or(0);
        if max <= 0 {
            return Ok(0);
        }
        let prefix = self.config.polecat_prefix();
        let live = self
            .supervisor
            .sessions_matching(|name| name.starts_with(&prefix))
            .await
            .map_err(|e| DispatchError::Capacity(e.to_string()))?;
        Ok(max - live.len() as i64)
    }

    async fn query_pending(&self) -> Result<Vec<PendingBead>, DispatchError> {
        let open = self.sling.list_open().await?;
        let (kept, broken) =
            filter_circuit_broken(open, self.config.patrol.max_dispatch_failures);
        for item in &broken {
            self.quarantine(item).await;
        }

        // Readiness: the work bead must have no open blockers.
        let mut ready_ids = HashSet::new();
        for item in &kept {
            if item.work_id.as_str().is_empty() {
                continue;
            }
            match self.tracker.show(&item.work_id).await {
                Ok(bead) if bead.is_open() && bead.blocked_by.is_empty() => {
                    ready_ids.insert(item.work_id.as_str().to_string());
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(work = %item.work_id, error = %err, "readiness probe failed");
                }
            }
        }
        Ok(blocker_aware(ready_ids)(kept))
    }

    async fn execute(&self, item: &PendingBead) -> Result<(), DispatchError> {
        let ctx = item
            .ctx
            .as_ref()
            .ok_or_else(|| DispatchError::Launch("sling context unreadable".to_string()))?;

        let session = self.config.session_name_for(item.work_id.as_str());
        let workdir = self.town_root.join(&self.config.rig.repo);
        let command = self.config.agent_command_for(item.work_id.as_str());

        let mut env = BTreeMap::new();
        env.insert(ENV_TOWN.to_string(), self.config.town.name.clone());
        env.insert(ENV_RIG.to_string(), ctx.rig.clone());
        env.insert(ENV_WORK_BEAD.to_string(), item.work_id.as_str().to_string());

        match self
            .supervisor
            .ensure_fresh(&session, &workdir, &command, &env)
            .await
        {
            Ok(_) => Ok(()),
            // An agent is already working this session; dispatch is done.
            Err(SupervisorError::SessionRunningHealthy(_)) => Ok(()),
            Err(err) => Err(DispatchError::Launch(err.to_string())),
        }
    }

    async fn on_success(&self, item: &PendingBead) -> Result<(), DispatchError> {
        self.sling.close(&item.sling_id, CloseReason::Dispatched).await
    }

    async fn on_failure(&self, item: &PendingBead, error: &DispatchError) {
        if error.is_commit_failure() {
            // The agent is running; closing the context again next cycle
            // would be wrong, and quarantining would strand the agent.
            tracing::error!(
                work = %item.work_id,
                error = %error,
                "agent launched but sling context still open"
            );
            return;
        }

        let Some(ctx) = item.ctx.as_ref() else {
            self.quarantine(item).await;
            return;
        };
        let mut updated = ctx.clone();
        updated.note_failure(&error.to_string());

        if self.policy.should_quarantine(updated.dispatch_failures) {
            if let Err(err) = self.sling.update(&item.sling_id, &updated).await {
                tracing::warn!(sling = %item.sling_id, error = %err, "failure bookkeeping failed");
            }
            self.quarantine(item).await;
            return;
        }

        if let Err(err) = self.sling.update(&item.sling_id, &updated).await {
            tracing::warn!(sling = %item.sling_id, error = %err, "failure bookkeeping failed");
        }
    }
}

#[cfg(test)]
#[path = "launcher_tests.rs"]
mod tests;
