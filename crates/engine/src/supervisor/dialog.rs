// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Startup dialog dismissal and idle detection.

use super::{Supervisor, SupervisorError};
use dk_adapters::{MuxAdapter, MuxError, ProcessTable};
use dk_core::Clock;
use std::time::Duration;

/// Marker the agent TUI shows when it is ready for input.
pub const AGENT_READY_MARKER: &str = "❯";

/// Marker shown while the agent is working and can be interrupted.
pub const AGENT_BUSY_MARKER: &str = "esc to interrupt";

/// Known dialog text: workspace trust prompt.
const TRUST_DIALOG_MARKER: &str = "trust this folder";

/// Known dialog text: permissions-mode confirmation (needs Down+Enter).
const BYPASS_DIALOG_MARKER: &str = "Bypass Permissions mode";

const DIALOG_POLL_INTERVAL: Duration = Duration::from_millis(250);
const DIALOG_CAPTURE_LINES: u32 = 30;
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(200);
/// The idle prompt is read from the last few lines only.
const IDLE_CAPTURE_LINES: u32 = 5;

const BLIND_ENTER_SETTLE: Duration = Duration::from_millis(500);
const BLIND_DOWN_SETTLE: Duration = Duration::from_millis(200);

impl<M: MuxAdapter, P: ProcessTable, C: Clock> Supervisor<M, P, C> {
    /// Poll for known startup dialogs and answer them until the agent
    /// prompt appears or the deadline expires.
    ///
    /// Returns true when the prompt indicator was seen.
    pub async fn dismiss_dialogs(
        &self,
        name: &str,
        deadline: Duration,
    ) -> Result<bool, SupervisorError> {
        let until = tokio::time::Instant::now() + deadline;
        loop {
            let screen = self.mux.capture_last_lines(name, DIALOG_CAPTURE_LINES).await?;

            if screen.contains(AGENT_READY_MARKER) {
                return Ok(true);
            }
            if screen.contains(TRUST_DIALOG_MARKER) {
                tracing::info!(session = name, "answering trust dialog");
                self.mux.send_key(name, "Enter").await?;
            } else if screen.contains(BYPASS_DIALOG_MARKER) {
                tracing::info!(session = name, "answering permissions dialog");
                self.mux.send_key(name, "Down").await?;
                tokio::time::sleep(BLIND_DOWN_SETTLE).await;
                self.mux.send_key(name, "Enter").await?;
            }

            if tokio::time::Instant::now() >= until {
                return Ok(false);
            }
            tokio::time::sleep(DIALOG_POLL_INTERVAL).await;
        }
    }

    /// Blind dismissal: Enter, Down, Enter with settles. A safe no-op when
    /// no dialog is present.
    pub async fn dismiss_dialogs_blind(&self, name: &str) -> Result<(), SupervisorError> {
        self.mux.send_key(name, "Enter").await?;
        tokio::time::sleep(BLIND_ENTER_SETTLE).await;
        self.mux.send_key(name, "Down").await?;
        tokio::time::sleep(BLIND_DOWN_SETTLE).await;
        self.mux.send_key(name, "Enter").await?;
        Ok(())
    }

    /// Whether the agent TUI is sitting at its idle prompt.
    pub async fn is_idle(&self, name: &str) -> Result<bool, SupervisorError> {
        let screen = self.mux.capture_last_lines(name, IDLE_CAPTURE_LINES).await?;
        Ok(screen.contains(AGENT_READY_MARKER) && !screen.contains(AGENT_BUSY_MARKER))
    }

    /// Poll until the idle prompt appears.
    ///
    /// Session-gone errors pass through; expiry yields
    /// [`SupervisorError::IdleTimeout`].
    pub async fn wait_for_idle(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<(), SupervisorError> {
        let until = tokio::time::Instant::now() + timeout;
        loop {
            match self.is_idle(name).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(SupervisorError::Mux(MuxError::CommandFailed(msg))) => {
                    tracing::debug!(session = name, error = %msg, "idle poll failed, retrying");
                }
                Err(err) => return Err(err),
            }
            if tokio::time::Instant::now() >= until {
                return Err(SupervisorError::IdleTimeout);
            }
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
#[path = "dialog_tests.rs"]
mod tests;
