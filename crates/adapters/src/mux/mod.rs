// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Terminal multiplexer adapters.
//!
//! The supervisor drives sessions exclusively through [`MuxAdapter`]. The
//! real implementation shells out to tmux on a named socket; the fake is an
//! in-memory session table for tests.

mod socket;
mod tmux;

pub use socket::{default_socket, set_default_socket, UNCONFIGURED_SOCKET};
pub use tmux::TmuxMux;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeMux, FakePane, FakeSession, MuxCall};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use thiserror::Error;

/// Errors from multiplexer operations
#[derive(Debug, Clone, Error)]
pub enum MuxError {
    /// No server is listening on the socket.
    #[error("no tmux server on socket {0:?}")]
    NoServer(String),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("session already exists: {0}")]
    SessionExists(String),
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("command failed: {0}")]
    CommandFailed(String),
}

impl MuxError {
    /// Structural errors surface immediately; everything else is a
    /// candidate for retry.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            MuxError::NoServer(_) | MuxError::SessionNotFound(_) | MuxError::SessionExists(_)
        )
    }
}

/// One pane of a session, as seen across all windows.
#[derive(Debug, Clone, PartialEq)]
pub struct PaneInfo {
    /// Pane id usable as a send target (e.g. `"%3"`).
    pub id: String,
    pub window_index: u32,
    pub pid: i32,
    /// The pane's current foreground command name.
    pub current_command: String,
}

/// Adapter for a terminal multiplexer server on a named socket.
#[async_trait]
pub trait MuxAdapter: Clone + Send + Sync + 'static {
    /// The socket this adapter talks to; used when building hook commands
    /// that the server runs against itself.
    fn socket_hint(&self) -> &str;

    /// Whether a session with this exact name exists.
    async fn has_session(&self, name: &str) -> Result<bool, MuxError>;

    /// Create a detached session running the default shell.
    async fn create_session(&self, name: &str, cwd: &Path) -> Result<(), MuxError>;

    /// Kill a session. Absent session or absent server is success.
    async fn kill_session(&self, name: &str) -> Result<(), MuxError>;

    /// Names of all sessions on the server. Absent server means none.
    async fn list_sessions(&self) -> Result<Vec<String>, MuxError>;

    /// Toggle remain-on-exit so pane exit status stays observable.
    async fn set_remain_on_exit(&self, name: &str, on: bool) -> Result<(), MuxError>;

    /// Set a session option (e.g. `window-size latest` so detached
    /// sessions track the most recent client geometry).
    async fn set_option(&self, name: &str, option: &str, value: &str) -> Result<(), MuxError>;

    /// Set a variable in the session environment table.
    async fn set_env(&self, name: &str, key: &str, value: &str) -> Result<(), MuxError>;

    /// Read a variable from the session environment table.
    async fn show_env(&self, name: &str, key: &str) -> Result<Option<String>, MuxError>;

    /// Replace the pane's process with a new command (`respawn-pane -k`).
    async fn respawn_pane(&self, target: &str, command: &str) -> Result<(), MuxError>;

    /// Send literal text (no key-name interpretation).
    async fn send_literal(&self, target: &str, text: &str) -> Result<(), MuxError>;

    /// Send a named key ("Enter", "Escape", "Down", ...).
    async fn send_key(&self, target: &str, key: &str) -> Result<(), MuxError>;

    /// Leave copy/scroll mode if the pane is in one. No-op otherwise.
    async fn exit_copy_mode(&self, target: &str) -> Result<(), MuxError>;

    /// Capture the last `lines` lines of the pane.
    async fn capture_last_lines(&self, target: &str, lines: u32) -> Result<String, MuxError>;

    /// All panes of a session across all windows.
    async fn list_panes(&self, session: &str) -> Result<Vec<PaneInfo>, MuxError>;

    /// Whether any client is attached to the session.
    async fn session_attached(&self, name: &str) -> Result<bool, MuxError>;

    /// Last activity timestamp of the session.
    async fn session_activity(&self, name: &str) -> Result<DateTime<Utc>, MuxError>;

    /// Pid of the target's primary pane process.
    async fn pane_pid(&self, target: &str) -> Result<i32, MuxError>;

    /// `None` while the pane process runs; `Some(exit_status)` once dead
    /// (−1 when the status is unobtainable).
    async fn pane_dead(&self, target: &str) -> Result<Option<i32>, MuxError>;

    /// Whether the pane is in copy/scroll or another mode.
    async fn pane_in_mode(&self, target: &str) -> Result<bool, MuxError>;

    /// The pane's current foreground command name.
    async fn pane_current_command(&self, target: &str) -> Result<String, MuxError>;

    /// Current window geometry of the session.
    async fn window_size(&self, name: &str) -> Result<(u32, u32), MuxError>;

    /// Resize the session's window.
    async fn resize_window(&self, name: &str, width: u32, height: u32) -> Result<(), MuxError>;

    /// Install the session's pane-died hook, replacing any previous one.
    /// The multiplexer supports exactly one pane-died hook per session.
    async fn set_pane_died_hook(&self, name: &str, command: &str) -> Result<(), MuxError>;

    /// Remove the session's pane-died hook.
    async fn clear_pane_died_hook(&self, name: &str) -> Result<(), MuxError>;
}
