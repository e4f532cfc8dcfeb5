// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! `dk daemon` - run the control plane in the foreground.

use dk_daemon::Daemon;
use std::path::PathBuf;

pub async fn run(town_root: PathBuf) -> anyhow::Result<()> {
    let daemon = Daemon::start(town_root).await?;
    println!(
        "control plane running for town {} (rig {}); ctrl-c to stop",
        daemon.config.town.name, daemon.config.rig.name
    );
    tokio::signal::ctrl_c().await?;
    daemon.shutdown().await;
    Ok(())
}
