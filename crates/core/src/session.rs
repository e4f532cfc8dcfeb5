// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Session naming and derived health status.

use serde::{Deserialize, Serialize};

/// Session environment variable carrying the comma-separated list of agent
/// process names the health probe should look for.
pub const AGENT_PROCS_ENV: &str = "DERRICK_AGENT_PROCS";

/// Older deployments set a single process name under this variable.
pub const AGENT_PROCS_ENV_LEGACY: &str = "DERRICK_AGENT_PROCESS";

/// Check a session name against the allowed charset `[A-Za-z0-9_-]+`.
pub fn validate_session_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Derived health of a supervised session.
///
/// Health is a function of (session exists) x (agent process alive) x
/// (activity freshness).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionHealth {
    /// Session exists, agent process alive, recent activity.
    Healthy,
    /// The multiplexer session is gone.
    SessionDead,
    /// Session exists but no descendant process matches the agent name set.
    AgentDead,
    /// Session and agent alive but no activity past the threshold.
    AgentHung,
}

impl SessionHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionHealth::Healthy => "healthy",
            SessionHealth::SessionDead => "session-dead",
            SessionHealth::AgentDead => "agent-dead",
            SessionHealth::AgentHung => "agent-hung",
        }
    }
}

impl std::fmt::Display for SessionHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
