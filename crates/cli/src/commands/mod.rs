// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! CLI command implementations.

pub mod alarm;
pub mod daemon;
pub mod refinery;
pub mod scheduler;
pub mod session;

use dk_daemon::TownConfig;
use std::path::Path;

/// Load the town config, surfacing parse errors to the operator.
pub fn load_config(town_root: &Path) -> anyhow::Result<TownConfig> {
    Ok(TownConfig::load(town_root)?)
}
