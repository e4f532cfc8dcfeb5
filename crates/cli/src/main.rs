// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! `dk` - operator CLI for the Derrick town control plane.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dk", version, about = "Derrick town control plane")]
struct Cli {
    /// Town root directory (defaults to $DERRICK_TOWN_ROOT, then cwd).
    #[arg(long, global = true)]
    town: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the control plane in the foreground.
    Daemon,
    /// Manage reminders.
    #[command(subcommand)]
    Alarm(commands::alarm::AlarmCommand),
    /// Operator control over the dispatch scheduler.
    #[command(subcommand)]
    Scheduler(commands::scheduler::SchedulerCommand),
    /// Inject a message into an agent session.
    Nudge {
        session: String,
        message: Vec<String>,
    },
    /// Inspect and manage agent sessions.
    #[command(subcommand)]
    Session(commands::session::SessionCommand),
    /// Merge queue inspection.
    #[command(subcommand)]
    Refinery(commands::refinery::RefineryCommand),
}

fn town_root(cli: &Cli) -> anyhow::Result<PathBuf> {
    if let Some(root) = &cli.town {
        return Ok(root.clone());
    }
    if let Some(root) = std::env::var_os("DERRICK_TOWN_ROOT") {
        return Ok(PathBuf::from(root));
    }
    Ok(std::env::current_dir()?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let town_root = town_root(&cli)?;

    match cli.command {
        Command::Daemon => commands::daemon::run(town_root).await,
        Command::Alarm(cmd) => commands::alarm::run(&town_root, cmd),
        Command::Scheduler(cmd) => commands::scheduler::run(&town_root, cmd),
        Command::Nudge { session, message } => {
            commands::session::nudge(&town_root, &session, &message.join(" ")).await
        }
        Command::Session(cmd) => commands::session::run(&town_root, cmd).await,
        Command::Refinery(cmd) => commands::refinery::run(&town_root, cmd).await,
    }
}
