// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Daemon lifecycle: lockfile, adapter wiring, background loops.

use crate::config::{ConfigError, TownConfig};
use crate::launcher::TownHooks;
use crate::loops::{dispatch_tick, run_periodic};
use dk_adapters::{
    set_default_socket, BdTracker, CliGit, CliMail, DesktopNotifyAdapter, PsProcessTable, TmuxMux,
};
use dk_core::SystemClock;
use dk_engine::{
    AlarmEngine, CycleConfig, DispatchCycle, Engineer, ShellGateRunner, Supervisor,
    SupervisorConfig,
};
use dk_storage::{AlarmStore, RuntimeDir, SchedulerStateStore};
use fs2::FileExt;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Daemon supervisor with concrete adapter types.
pub type DaemonSupervisor = Supervisor<TmuxMux, PsProcessTable, SystemClock>;

/// Errors from daemon startup
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("another control plane holds the lock at {0}")]
    LockHeld(PathBuf),
}

/// A running control plane.
pub struct Daemon {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    // NOTE(lifetime): held to maintain the exclusive town lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub supervisor: DaemonSupervisor,
    pub config: Arc<TownConfig>,
}

impl Daemon {
    /// Start the control plane for a town: acquire the lock, wire the
    /// adapters, and spawn the four background loops.
    pub async fn start(town_root: PathBuf) -> Result<Self, LifecycleError> {
        let config = Arc::new(TownConfig::load(&town_root)?);
        let runtime = RuntimeDir::new(&town_root);
        runtime.ensure()?;

        let lock_path = runtime.lock_path();
        let mut lock_file = File::create(&lock_path)?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(LifecycleError::LockHeld(lock_path));
        }
        let _ = writeln!(lock_file, "{}", std::process::id());

        // The socket is per-town ambient state; pin the process default so
        // stray adapter constructions fail toward this town, never toward
        // the user's personal server.
        let socket = config.socket();
        set_default_socket(socket.clone());

        let clock = SystemClock;
        let mux = TmuxMux::new(socket.clone());
        let supervisor = Supervisor::new(
            mux,
            PsProcessTable::new(),
            clock,
            SupervisorConfig {
                agent_proc_names: config.agent.proc_names.clone(),
                ..Default::default()
            },
        );

        let tracker = BdTracker::new(&town_root);
        let sling = dk_engine::SlingStore::new(tracker.clone(), format!("{}/deacon", config.town.name));
        let hooks = TownHooks::new(
            supervisor.clone(),
            sling,
            tracker.clone(),
            DesktopNotifyAdapter::new(),
            Arc::clone(&config),
            town_root.clone(),
        );
        let cycle = Arc::new(DispatchCycle::new(
            hooks,
            CycleConfig {
                batch_size: config.scheduler.batch_size,
                spawn_delay: config.scheduler.spawn_delay,
            },
        ));
        let state_store = SchedulerStateStore::new(&runtime);
        let alarms = Arc::new(AlarmEngine::new(AlarmStore::new(&runtime), clock));

        let repo = town_root.join(&config.rig.repo);
        let engineer = Arc::new(Engineer::new(
            config.rig.name.clone(),
            config.rig.default_branch.clone(),
            config.refinery.clone(),
            tracker,
            CliGit::new(&repo),
            ShellGateRunner::new(&repo),
            CliMail::new(&town_root),
            clock,
        ));

        let (shutdown, rx) = watch::channel(false);
        let mut tasks = Vec::new();

        // Dispatch ticker. max_polecats <= 0 means direct dispatch only;
        // the deferred scheduler stays off.
        if config.scheduler.deferred_enabled() {
            let cycle = Arc::clone(&cycle);
            let state_store = state_store.clone();
            tasks.push(tokio::spawn(run_periodic(
                "dispatch",
                config.patrol.dispatch_interval,
                rx.clone(),
                move || {
                    let cycle = Arc::clone(&cycle);
                    let state_store = state_store.clone();
                    async move {
                        if let Err(err) = dispatch_tick(cycle.as_ref(), &state_store, &SystemClock).await
                        {
                            tracing::error!(error = %err, "dispatch cycle errored");
                        }
                    }
                },
            )));
        } else {
            tracing::info!("deferred scheduler disabled (max_polecats unset)");
        }

        // Refinery poll.
        if config.refinery.enabled {
            let engineer = Arc::clone(&engineer);
            tasks.push(tokio::spawn(run_periodic(
                "refinery",
                config.refinery.poll_interval,
                rx.clone(),
                move || {
                    let engineer = Arc::clone(&engineer);
                    async move {
                        match engineer.run_once().await {
                            Ok(outcomes) if !outcomes.is_empty() => {
                                tracing::info!(count = outcomes.len(), "merge queue cycle complete");
                            }
                            Ok(_) => {}
                            Err(err) => tracing::error!(error = %err, "merge queue cycle errored"),
                        }
                    }
                },
            )));
        }

        // Alarm fire loop; delivery goes through the supervisor's nudge.
        {
            let alarms = Arc::clone(&alarms);
            let sup = supervisor.clone();
            tasks.push(tokio::spawn(run_periodic(
                "alarms",
                config.patrol.alarm_interval,
                rx.clone(),
                move || {
                    let alarms = Arc::clone(&alarms);
                    let sup = sup.clone();
                    async move {
                        let nudge = |target: String, message: String| {
                            let sup = sup.clone();
                            async move {
                                let session = target.replace('/', "-");
                                sup.nudge(&session, &message)
                                    .await
                                    .map_err(|e| e.to_string())
                            }
                        };
                        if let Err(err) = alarms.fire_due(nudge).await {
                            tracing::error!(error = %err, "alarm loop errored");
                        }
                    }
                },
            )));
        }

        // Session-health patrol: reap managed sessions whose agent died.
        {
            let sup = supervisor.clone();
            let prefix = config.session_prefix();
            tasks.push(tokio::spawn(run_periodic(
                "health",
                config.patrol.health_interval,
                rx.clone(),
                move || {
                    let sup = sup.clone();
                    let prefix = prefix.clone();
                    async move {
                        match sup
                            .cleanup_orphaned_sessions(|name| name.starts_with(&prefix))
                            .await
                        {
                            Ok(killed) if !killed.is_empty() => {
                                tracing::warn!(sessions = ?killed, "reaped zombie sessions");
                            }
                            Ok(_) => {}
                            Err(err) => tracing::error!(error = %err, "health patrol errored"),
                        }
                    }
                },
            )));
        }

        tracing::info!(
            town = %config.town.name,
            rig = %config.rig.name,
            socket = %socket,
            "control plane started"
        );

        Ok(Self {
            shutdown,
            tasks,
            lock_file,
            supervisor,
            config,
        })
    }

    /// Signal the loops and wait for them to drain.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        tracing::info!("control plane stopped");
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
