// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Session health probing and zombie cleanup.

use super::{Supervisor, SupervisorError};
use dk_adapters::{MuxAdapter, PaneInfo, ProcSnapshot, ProcessTable};
use dk_core::{Clock, SessionHealth, AGENT_PROCS_ENV, AGENT_PROCS_ENV_LEGACY};
use std::time::Duration;

impl<M: MuxAdapter, P: ProcessTable, C: Clock> Supervisor<M, P, C> {
    /// Derive the health of a session.
    ///
    /// Health is (session exists) x (agent process alive) x (activity
    /// freshness), in that order of precedence.
    pub async fn check_session_health(
        &self,
        name: &str,
        max_inactivity: Duration,
    ) -> Result<SessionHealth, SupervisorError> {
        if !self.mux.has_session(name).await? {
            return Ok(SessionHealth::SessionDead);
        }

        if !self.agent_alive(name).await? {
            return Ok(SessionHealth::AgentDead);
        }

        let activity = self.mux.session_activity(name).await?;
        let idle_for = self
            .clock
            .now()
            .signed_duration_since(activity)
            .to_std()
            .unwrap_or_default();
        if idle_for > max_inactivity {
            return Ok(SessionHealth::AgentHung);
        }

        Ok(SessionHealth::Healthy)
    }

    /// Whether any pane of the session is running the configured agent.
    ///
    /// The process-name set is recovered from the session environment (with
    /// a legacy single-name fallback), so a restarted control plane probes
    /// with the names the session was created with. A pane matches when its
    /// current command is in the set, when it runs a known shell with a
    /// matching descendant, or when its pid's executable basename matches
    /// (agents that rewrite argv[0] to a version string).
    pub async fn agent_alive(&self, name: &str) -> Result<bool, SupervisorError> {
        let proc_names = self.agent_proc_names(name).await?;
        let mut panes = match self.mux.list_panes(name).await {
            Ok(panes) => panes,
            Err(dk_adapters::MuxError::SessionNotFound(_)) => return Ok(false),
            Err(err) => return Err(err.into()),
        };
        if panes.is_empty() {
            return Ok(false);
        }
        // First-window fast path: agents almost always live in window 0.
        panes.sort_by_key(|p| p.window_index);

        let snapshot = self
            .procs
            .snapshot()
            .await
            .map_err(|e| SupervisorError::ProcTable(e.to_string()))?;

        for pane in &panes {
            if self
                .pane_runs_agent(pane, &proc_names, &snapshot)
                .await
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn pane_runs_agent(
        &self,
        pane: &PaneInfo,
        proc_names: &[String],
        snapshot: &ProcSnapshot,
    ) -> bool {
        if proc_names.iter().any(|n| *n == pane.current_command) {
            return true;
        }

        if self.config.known_shells.contains(&pane.current_command) {
            for pid in snapshot.descendants_deepest_first(pane.pid) {
                if let Some(comm) = snapshot.comm(pid) {
                    if proc_names.iter().any(|n| n == comm) {
                        return true;
                    }
                }
            }
        }

        // argv[0] rewrites make pane_current_command useless; the kernel
        // still knows the executable.
        if let Some(exe) = self.procs.exe_basename(pane.pid).await {
            if proc_names.iter().any(|n| *n == exe) {
                return true;
            }
        }

        false
    }

    /// The agent process-name set for a session, from its environment.
    async fn agent_proc_names(&self, name: &str) -> Result<Vec<String>, SupervisorError> {
        if let Some(joined) = self.mux.show_env(name, AGENT_PROCS_ENV).await? {
            let names: Vec<String> = joined
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !names.is_empty() {
                return Ok(names);
            }
        }
        if let Some(single) = self.mux.show_env(name, AGENT_PROCS_ENV_LEGACY).await? {
            let single = single.trim().to_string();
            if !single.is_empty() {
                return Ok(vec![single]);
            }
        }
        Ok(self.config.agent_proc_names.clone())
    }

    /// Kill every managed session whose agent has died.
    ///
    /// "Managed" is decided by the caller-supplied predicate; the supervisor
    /// has no notion of which sessions belong to the town.
    pub async fn cleanup_orphaned_sessions(
        &self,
        is_managed: impl Fn(&str) -> bool,
    ) -> Result<Vec<String>, SupervisorError> {
        let mut killed = Vec::new();
        for session in self.mux.list_sessions().await? {
            if !is_managed(&session) {
                continue;
            }
            if self.agent_alive(&session).await? {
                continue;
            }
            tracing::warn!(session = %session, "agent dead, reaping zombie session");
            self.kill_with_processes(&session, &[]).await?;
            killed.push(session);
        }
        Ok(killed)
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
