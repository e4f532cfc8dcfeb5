// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Process-tree-aware termination.

use super::{Supervisor, SupervisorError};
use dk_adapters::{MuxAdapter, ProcessTable, TermSignal};
use dk_core::Clock;
use std::time::Duration;

/// Grace period between SIGTERM and SIGKILL.
const KILL_GRACE: Duration = Duration::from_secs(2);

impl<M: MuxAdapter, P: ProcessTable, C: Clock> Supervisor<M, P, C> {
    /// Kill a session and every process it spawned, leaving no orphans.
    ///
    /// The termination list is the pane's descendants deepest-first, plus
    /// process-group members that have been reparented to init and are not
    /// already in the descendant set. Group members are enumerated and
    /// filtered instead of a blind `kill(-pgid)`, which could hit unrelated
    /// groups that happen to share the id.
    ///
    /// `exclude_pids` are never signalled, which lets a process inside the
    /// session destroy its own session.
    pub async fn kill_with_processes(
        &self,
        name: &str,
        exclude_pids: &[i32],
    ) -> Result<(), SupervisorError> {
        let pane_pid = match self.mux.pane_pid(name).await {
            Ok(pid) => pid,
            // Session already gone; make sure it stays gone.
            Err(_) => {
                self.mux.kill_session(name).await?;
                return Ok(());
            }
        };

        let snapshot = self
            .procs
            .snapshot()
            .await
            .map_err(|e| SupervisorError::ProcTable(e.to_string()))?;

        let descendants = snapshot.descendants_deepest_first(pane_pid);

        let mut targets = descendants.clone();
        if let Some(pgid) = snapshot.pgid(pane_pid) {
            for member in snapshot.group_members(pgid) {
                let reparented = snapshot.ppid(member) == Some(1);
                if reparented && member != pane_pid && !descendants.contains(&member) {
                    targets.push(member);
                }
            }
        }
        targets.retain(|pid| !exclude_pids.contains(pid));

        if !targets.is_empty() {
            tracing::info!(session = name, count = targets.len(), "terminating process tree");
            self.terminate_pids(&targets).await;
        }

        if !exclude_pids.contains(&pane_pid) {
            self.terminate_pids(&[pane_pid]).await;
        }

        self.mux.kill_session(name).await?;
        Ok(())
    }

    /// SIGTERM all pids, wait out the grace period, then SIGKILL survivors.
    async fn terminate_pids(&self, pids: &[i32]) {
        for pid in pids {
            self.procs.signal(*pid, TermSignal::Term).await;
        }
        tokio::time::sleep(KILL_GRACE).await;
        let survivors = match self.procs.snapshot().await {
            Ok(snapshot) => pids
                .iter()
                .copied()
                .filter(|pid| snapshot.exists(*pid))
                .collect(),
            // Can't tell who survived; force-kill the lot.
            Err(_) => pids.to_vec(),
        };
        for pid in survivors {
            self.procs.signal(pid, TermSignal::Kill).await;
        }
    }
}

#[cfg(test)]
#[path = "kill_tests.rs"]
mod tests;
