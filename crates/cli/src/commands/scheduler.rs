// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Scheduler operator control: `dk scheduler pause|resume|status`.

use chrono::Utc;
use clap::Subcommand;
use dk_storage::{RuntimeDir, SchedulerStateStore};
use std::path::Path;

#[derive(Subcommand)]
pub enum SchedulerCommand {
    /// Pause dispatching (running agents are unaffected).
    Pause {
        /// Who is pausing, for the audit trail.
        #[arg(long, default_value = "operator")]
        by: String,
    },
    /// Resume dispatching.
    Resume,
    /// Show the scheduler record.
    Status,
}

pub fn run(town_root: &Path, cmd: SchedulerCommand) -> anyhow::Result<()> {
    let store = SchedulerStateStore::new(&RuntimeDir::new(town_root));
    match cmd {
        SchedulerCommand::Pause { by } => {
            let state = store.update(|s| s.pause(&by, Utc::now()))?;
            println!("scheduler paused by {}", state.paused_by);
            Ok(())
        }
        SchedulerCommand::Resume => {
            store.update(|s| s.resume())?;
            println!("scheduler resumed");
            Ok(())
        }
        SchedulerCommand::Status => {
            let state = store.load()?;
            if state.paused {
                match state.paused_at {
                    Some(at) => println!("paused by {} at {}", state.paused_by, at.to_rfc3339()),
                    None => println!("paused by {}", state.paused_by),
                }
            } else {
                println!("running");
            }
            match state.last_dispatch_at {
                Some(at) => println!(
                    "last dispatch: {} item(s) at {}",
                    state.last_dispatch_count,
                    at.to_rfc3339()
                ),
                None => println!("last dispatch: never"),
            }
            Ok(())
        }
    }
}
