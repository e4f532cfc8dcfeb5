// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Town configuration (`<town>/derrick.toml`).

use dk_core::{RefineryConfig, SchedulerConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors from config loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config unreadable: {0}")]
    Io(#[from] std::io::Error),
    #[error("config invalid: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level town configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TownConfig {
    pub town: TownSection,
    pub rig: RigSection,
    pub agent: AgentSection,
    pub scheduler: SchedulerConfig,
    pub refinery: RefineryConfig,
    pub patrol: PatrolSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TownSection {
    pub name: String,
    /// Multiplexer socket. Defaults to `derrick-<town name>`.
    pub socket: Option<String>,
}

impl Default for TownSection {
    fn default() -> Self {
        Self {
            name: "town".to_string(),
            socket: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RigSection {
    pub name: String,
    pub default_branch: String,
    /// Rig checkout, relative to the town root.
    pub repo: PathBuf,
}

impl Default for RigSection {
    fn default() -> Self {
        Self {
            name: "alpha".to_string(),
            default_branch: "main".to_string(),
            repo: PathBuf::from("rig"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentSection {
    /// Launch command; `{work}` is replaced with the work bead id.
    pub command: String,
    /// Process names the health probe recognizes as the agent.
    pub proc_names: Vec<String>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            command: "claude --permission-mode bypassPermissions \"{work}\"".to_string(),
            proc_names: vec!["claude".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PatrolSection {
    /// Dispatch cycle cadence.
    #[serde(with = "duration_ms")]
    pub dispatch_interval: Duration,
    /// Alarm fire-loop cadence.
    #[serde(with = "duration_ms")]
    pub alarm_interval: Duration,
    /// Session-health patrol cadence.
    #[serde(with = "duration_ms")]
    pub health_interval: Duration,
    /// Activity staleness before a session counts as hung.
    #[serde(with = "duration_ms")]
    pub max_inactivity: Duration,
    /// Dispatch failures before an item is quarantined.
    pub max_dispatch_failures: u32,
}

impl Default for PatrolSection {
    fn default() -> Self {
        Self {
            dispatch_interval: Duration::from_secs(30),
            alarm_interval: Duration::from_secs(15),
            health_interval: Duration::from_secs(60),
            max_inactivity: Duration::from_secs(30 * 60),
            max_dispatch_failures: 3,
        }
    }
}

impl TownConfig {
    /// Load `<town>/derrick.toml`; an absent file means defaults.
    pub fn load(town_root: &Path) -> Result<Self, ConfigError> {
        let path = town_root.join("derrick.toml");
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        Ok(toml::from_str(&text)?)
    }

    /// The multiplexer socket for this town.
    pub fn socket(&self) -> String {
        self.town
            .socket
            .clone()
            .unwrap_or_else(|| format!("derrick-{}", self.town.name))
    }

    /// Prefix identifying sessions managed by this town's rig.
    pub fn session_prefix(&self) -> String {
        format!("{}-", self.rig.name)
    }

    /// Prefix identifying polecat (work-agent) sessions, the ones counted
    /// against `max_polecats`.
    pub fn polecat_prefix(&self) -> String {
        format!("{}polecat-", self.session_prefix())
    }

    /// Session name for a work bead's agent.
    pub fn session_name_for(&self, work_id: &str) -> String {
        let safe: String = work_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        format!("{}polecat-{}", self.session_prefix(), safe)
    }

    /// The agent launch command for a work bead.
    pub fn agent_command_for(&self, work_id: &str) -> String {
        self.agent.command.replace("{work}", work_id)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (duration.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
