// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Merge queue inspection: `dk refinery ...`.

use super::load_config;
use chrono::Utc;
use clap::Subcommand;
use dk_adapters::{BdTracker, CliGit, CliMail};
use dk_core::{format_elapsed, AnomalyKind, SystemClock};
use dk_engine::{Engineer, ShellGateRunner};
use std::path::Path;

#[derive(Subcommand)]
pub enum RefineryCommand {
    /// Scan open merge requests for stale claims and orphaned branches.
    Anomalies,
    /// Run one merge queue cycle now.
    RunOnce,
}

pub async fn run(town_root: &Path, cmd: RefineryCommand) -> anyhow::Result<()> {
    let config = load_config(town_root)?;
    let repo = town_root.join(&config.rig.repo);
    let engineer = Engineer::new(
        config.rig.name.clone(),
        config.rig.default_branch.clone(),
        config.refinery.clone(),
        BdTracker::new(town_root),
        CliGit::new(&repo),
        ShellGateRunner::new(&repo),
        CliMail::new(town_root),
        SystemClock,
    );

    match cmd {
        RefineryCommand::Anomalies => {
            let anomalies = engineer.list_queue_anomalies(Utc::now()).await?;
            if anomalies.is_empty() {
                println!("queue clean");
                return Ok(());
            }
            for anomaly in anomalies {
                match anomaly.kind {
                    AnomalyKind::StaleClaim => {
                        // The scan emits ages only; the operator surface
                        // judges them against the configured thresholds.
                        let age = anomaly.age.unwrap_or_default();
                        let tier = if config.refinery.staleness_exceeds_critical(age) {
                            "critical"
                        } else {
                            "warning"
                        };
                        println!(
                            "stale-claim      {} [{}] (age {}) {}",
                            anomaly.mr,
                            tier,
                            format_elapsed(age),
                            anomaly.detail
                        );
                    }
                    AnomalyKind::OrphanedBranch => {
                        println!("orphaned-branch  {} {}", anomaly.mr, anomaly.detail);
                    }
                }
            }
            Ok(())
        }
        RefineryCommand::RunOnce => {
            let outcomes = engineer.run_once().await?;
            if outcomes.is_empty() {
                println!("nothing to merge");
            }
            for (id, outcome) in outcomes {
                println!("{}: {:?}", id, outcome);
            }
            Ok(())
        }
    }
}
