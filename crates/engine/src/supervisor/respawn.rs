// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Server-side auto-respawn hook.

use super::{Supervisor, SupervisorError};
use dk_adapters::{MuxAdapter, ProcessTable};
use dk_core::Clock;

/// Debounce before the hook re-checks the pane, in seconds. The control
/// plane may have restarted the session itself in the meantime.
const RESPAWN_DEBOUNCE_SECS: u32 = 3;

impl<M: MuxAdapter, P: ProcessTable, C: Clock> Supervisor<M, P, C> {
    /// Install a pane-died hook that respawns the original command.
    ///
    /// The hook sleeps out a debounce, re-checks that the pane is still
    /// dead, respawns it, and re-enables remain-on-exit so the next death
    /// is observable too. The multiplexer supports one pane-died hook per
    /// session, so this replaces any crash-logging hook already installed.
    pub async fn install_respawn_hook(
        &self,
        name: &str,
        command: &str,
    ) -> Result<(), SupervisorError> {
        let hook = build_respawn_hook(self.mux.socket_hint(), name, command);
        self.mux.set_pane_died_hook(name, &hook).await?;
        tracing::info!(session = name, "auto-respawn hook installed");
        Ok(())
    }

    /// Remove the session's pane-died hook.
    pub async fn remove_respawn_hook(&self, name: &str) -> Result<(), SupervisorError> {
        self.mux.clear_pane_died_hook(name).await?;
        Ok(())
    }
}

/// Build the hook command string.
///
/// Runs inside the multiplexer server via run-shell, so it must address the
/// server by socket explicitly.
fn build_respawn_hook(socket: &str, name: &str, command: &str) -> String {
    let escaped = command.replace('\'', r"'\''");
    format!(
        concat!(
            "run-shell \"sleep {debounce}; ",
            "if [ \\\"$(tmux -L {socket} display-message -p -t ={name} '#{{pane_dead}}')\\\" = 1 ]; then ",
            "tmux -L {socket} respawn-pane -k -t ={name} '{command}'; ",
            "tmux -L {socket} set-option -t ={name} remain-on-exit on; ",
            "fi\""
        ),
        debounce = RESPAWN_DEBOUNCE_SECS,
        socket = socket,
        name = name,
        command = escaped,
    )
}

#[cfg(test)]
#[path = "respawn_tests.rs"]
mod tests;
