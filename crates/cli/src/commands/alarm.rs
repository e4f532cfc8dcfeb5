// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Alarm management: `dk alarm add|list|cancel`.

use chrono::Utc;
use clap::Subcommand;
use dk_core::{Alarm, Clock, SystemClock};
use dk_storage::{AlarmStore, RuntimeDir, StoreError};
use std::path::Path;

#[derive(Subcommand)]
pub enum AlarmCommand {
    /// Create an alarm from a schedule string
    /// (repeat:<dur>[@unit] | in:<dur> | at:now[±dur] | at:<RFC3339>).
    Add {
        schedule: String,
        /// Nudge target (session name or rig/role address).
        target: String,
        /// Message delivered on fire.
        message: Vec<String>,
    },
    /// List alarms, soonest first.
    List,
    /// Cancel an alarm by id.
    Cancel { id: String },
}

pub fn run(town_root: &Path, cmd: AlarmCommand) -> anyhow::Result<()> {
    let store = AlarmStore::new(&RuntimeDir::new(town_root));
    match cmd {
        AlarmCommand::Add {
            schedule,
            target,
            message,
        } => {
            let alarm = Alarm::from_schedule(
                &schedule,
                target,
                message.join(" "),
                SystemClock.now(),
            )
            .map_err(|e| anyhow::anyhow!("{e}"))?;
            store.save(&alarm)?;
            println!(
                "alarm {} scheduled, next fire {}",
                alarm.id,
                alarm.next_fire_at.to_rfc3339()
            );
            Ok(())
        }
        AlarmCommand::List => {
            let alarms = store.list()?;
            if alarms.is_empty() {
                println!("no alarms");
                return Ok(());
            }
            let now = Utc::now();
            for alarm in alarms {
                let due_in = alarm.next_fire_at.signed_duration_since(now).num_seconds();
                let kind = if alarm.recurring { "repeat" } else { "once" };
                println!(
                    "{}  {:<6} fires {:<8} {} -> {}  {:?}",
                    alarm.id,
                    kind,
                    dk_core::format_countdown(due_in),
                    alarm.schedule,
                    alarm.target,
                    alarm.message,
                );
                if !alarm.last_error.is_empty() {
                    println!(
                        "          {} consecutive failures, last: {}",
                        alarm.fail_count, alarm.last_error
                    );
                }
            }
            Ok(())
        }
        AlarmCommand::Cancel { id } => match store.cancel(&id) {
            Ok(()) => {
                println!("alarm {} cancelled", id);
                Ok(())
            }
            Err(StoreError::NotFound(_)) => {
                anyhow::bail!("no alarm with id {}", id)
            }
            Err(err) => Err(err.into()),
        },
    }
}
