// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Session inspection and control: `dk session ...`, `dk nudge`.

use super::load_config;
use clap::Subcommand;
use dk_adapters::{PsProcessTable, TmuxMux};
use dk_core::SystemClock;
use dk_engine::{Supervisor, SupervisorConfig};
use std::path::Path;
use std::time::Duration;

#[derive(Subcommand)]
pub enum SessionCommand {
    /// List this town's managed sessions.
    List,
    /// Report a session's derived health.
    Health {
        name: String,
        /// Inactivity threshold in seconds before reporting agent-hung.
        #[arg(long, default_value_t = 1800)]
        max_inactivity: u64,
    },
    /// Kill a session and its whole process tree.
    Kill { name: String },
}

type CliSupervisor = Supervisor<TmuxMux, PsProcessTable, SystemClock>;

fn supervisor(town_root: &Path) -> anyhow::Result<(CliSupervisor, String)> {
    let config = load_config(town_root)?;
    let mux = TmuxMux::new(config.socket());
    let supervisor = Supervisor::new(
        mux,
        PsProcessTable::new(),
        SystemClock,
        SupervisorConfig {
            agent_proc_names: config.agent.proc_names.clone(),
            ..Default::default()
        },
    );
    Ok((supervisor, config.session_prefix()))
}

pub async fn run(town_root: &Path, cmd: SessionCommand) -> anyhow::Result<()> {
    let (supervisor, prefix) = supervisor(town_root)?;
    match cmd {
        SessionCommand::List => {
            let sessions = supervisor
                .sessions_matching(|name| name.starts_with(&prefix))
                .await?;
            if sessions.is_empty() {
                println!("no managed sessions");
            }
            for session in sessions {
                println!("{}", session);
            }
            Ok(())
        }
        SessionCommand::Health {
            name,
            max_inactivity,
        } => {
            let health = supervisor
                .check_session_health(&name, Duration::from_secs(max_inactivity))
                .await?;
            println!("{}", health);
            Ok(())
        }
        SessionCommand::Kill { name } => {
            supervisor.kill_with_processes(&name, &[]).await?;
            println!("session {} terminated", name);
            Ok(())
        }
    }
}

pub async fn nudge(town_root: &Path, session: &str, message: &str) -> anyhow::Result<()> {
    let (supervisor, _) = supervisor(town_root)?;
    supervisor.nudge(session, message).await?;
    println!("nudged {}", session);
    Ok(())
}
