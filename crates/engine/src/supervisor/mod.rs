// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Session supervisor.
//!
//! Owns the multiplexer session lifecycle for every agent: creation with a
//! specific command and environment, health probing, input injection
//! ("nudge"), and process-tree-aware termination. Nothing else in the
//! control plane talks to the multiplexer directly.

mod dialog;
mod health;
mod kill;
mod nudge;
mod respawn;

pub use dialog::{AGENT_BUSY_MARKER, AGENT_READY_MARKER};
pub use nudge::sanitize_nudge;

use dk_adapters::{MuxAdapter, MuxError, ProcessTable};
use dk_core::{validate_session_name, Clock, AGENT_PROCS_ENV};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Pane-dead polls after respawning the agent command: catches commands
/// that exit immediately (bad binary, bad flags) while they are still
/// observable under remain-on-exit.
const STARTUP_POLLS: [Duration; 2] = [Duration::from_millis(50), Duration::from_millis(250)];

/// Errors from supervisor operations
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("invalid session name: {0:?}")]
    InvalidSessionName(String),
    #[error("session already exists: {0}")]
    SessionExists(String),
    #[error("session running with healthy agent: {0}")]
    SessionRunningHealthy(String),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("no multiplexer server")]
    NoServer,
    #[error("agent startup failed in {session}: command exited with status {status}")]
    StartupFailed { session: String, status: i32 },
    #[error("nudge lock on {session} timed out after {timeout:?}")]
    HungLock { session: String, timeout: Duration },
    #[error("timed out waiting for idle prompt")]
    IdleTimeout,
    #[error("process table unavailable: {0}")]
    ProcTable(String),
    #[error(transparent)]
    Mux(MuxError),
}

impl From<MuxError> for SupervisorError {
    fn from(err: MuxError) -> Self {
        match err {
            MuxError::NoServer(_) => SupervisorError::NoServer,
            MuxError::SessionNotFound(name) => SupervisorError::SessionNotFound(name),
            MuxError::SessionExists(name) => SupervisorError::SessionExists(name),
            other => SupervisorError::Mux(other),
        }
    }
}

/// Outcome of [`Supervisor::ensure_fresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// No session existed; one was created.
    Created,
    /// A zombie session was torn down and replaced.
    Recreated,
}

/// Supervisor tuning.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Process names that count as "the agent" for health probing.
    pub agent_proc_names: Vec<String>,
    /// Shells whose descendants are searched for the agent.
    pub known_shells: Vec<String>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            agent_proc_names: vec!["claude".to_string()],
            known_shells: vec![
                "bash".to_string(),
                "zsh".to_string(),
                "sh".to_string(),
                "fish".to_string(),
            ],
        }
    }
}

/// The session supervisor.
pub struct Supervisor<M: MuxAdapter, P: ProcessTable, C: Clock> {
    pub(crate) mux: M,
    pub(crate) procs: P,
    pub(crate) clock: C,
    pub(crate) config: SupervisorConfig,
    /// Per-session nudge serialization (binary semaphores).
    pub(crate) nudge_locks: Arc<Mutex<HashMap<String, Arc<Semaphore>>>>,
}

impl<M: MuxAdapter, P: ProcessTable, C: Clock> Clone for Supervisor<M, P, C> {
    fn clone(&self) -> Self {
        Self {
            mux: self.mux.clone(),
            procs: self.procs.clone(),
            clock: self.clock.clone(),
            config: self.config.clone(),
            nudge_locks: Arc::clone(&self.nudge_locks),
        }
    }
}

impl<M: MuxAdapter, P: ProcessTable, C: Clock> Supervisor<M, P, C> {
    pub fn new(mux: M, procs: P, clock: C, config: SupervisorConfig) -> Self {
        Self {
            mux,
            procs,
            clock,
            config,
            nudge_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn mux(&self) -> &M {
        &self.mux
    }

    /// Create a detached session running `cmd` in `workdir`.
    ///
    /// Two-phase to eliminate the shell-ready race: the session is created
    /// with the default shell, remain-on-exit is enabled so exit status is
    /// observable, the environment is injected (sorted keys), and only then
    /// is the pane respawned with the real command. Early exits are caught
    /// by two pane-dead polls; a non-zero status tears the session down.
    pub async fn create_session(
        &self,
        name: &str,
        workdir: &Path,
        cmd: &str,
        env: &BTreeMap<String, String>,
    ) -> Result<(), SupervisorError> {
        if !validate_session_name(name) {
            return Err(SupervisorError::InvalidSessionName(name.to_string()));
        }

        self.mux.create_session(name, workdir).await?;
        self.mux.set_remain_on_exit(name, true).await?;
        // Detached sessions otherwise keep the 80x24 default and TUIs
        // render for a terminal nobody has.
        self.mux.set_option(name, "window-size", "latest").await?;

        // Session env must be in place before the respawn so later queries
        // (health probe, tooling inside the session) see it.
        self.mux
            .set_env(name, AGENT_PROCS_ENV, &self.config.agent_proc_names.join(","))
            .await?;
        for (key, value) in env {
            self.mux.set_env(name, key, value).await?;
        }

        self.mux.respawn_pane(name, cmd).await?;

        for delay in STARTUP_POLLS {
            tokio::time::sleep(delay).await;
            if let Some(status) = self.mux.pane_dead(name).await? {
                if status != 0 {
                    tracing::error!(session = name, status, cmd, "agent exited at startup");
                    let _ = self.mux.kill_session(name).await;
                    return Err(SupervisorError::StartupFailed {
                        session: name.to_string(),
                        status,
                    });
                }
            }
        }

        self.mux.set_remain_on_exit(name, false).await?;
        tracing::info!(session = name, workdir = %workdir.display(), "session created");
        Ok(())
    }

    /// Ensure a fresh session exists for `name`.
    ///
    /// Create-first to avoid TOCTOU: on duplicate, probe the agent. A
    /// healthy agent returns [`SupervisorError::SessionRunningHealthy`]; a
    /// dead one is torn down (with its process tree) and re-created. Losing
    /// the re-create race to another caller counts as success.
    pub async fn ensure_fresh(
        &self,
        name: &str,
        workdir: &Path,
        cmd: &str,
        env: &BTreeMap<String, String>,
    ) -> Result<EnsureOutcome, SupervisorError> {
        match self.create_session(name, workdir, cmd, env).await {
            Ok(()) => Ok(EnsureOutcome::Created),
            Err(SupervisorError::SessionExists(_)) => {
                if self.agent_alive(name).await? {
                    return Err(SupervisorError::SessionRunningHealthy(name.to_string()));
                }
                tracing::warn!(session = name, "zombie session, recycling");
                self.kill_with_processes(name, &[]).await?;
                match self.create_session(name, workdir, cmd, env).await {
                    Ok(()) => Ok(EnsureOutcome::Recreated),
                    // Someone else re-created it first; their session serves.
                    Err(SupervisorError::SessionExists(_)) => Ok(EnsureOutcome::Recreated),
                    Err(err) => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Kill a session. Absent session or absent server is success.
    pub async fn kill(&self, name: &str) -> Result<(), SupervisorError> {
        self.mux.kill_session(name).await?;
        Ok(())
    }

    /// All sessions on the server matching a predicate.
    pub async fn sessions_matching(
        &self,
        predicate: impl Fn(&str) -> bool,
    ) -> Result<Vec<String>, SupervisorError> {
        let mut names = self.mux.list_sessions().await?;
        names.retain(|n| predicate(n));
        Ok(names)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
