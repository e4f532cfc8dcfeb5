// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Process-wide default multiplexer socket.
//!
//! The socket name is per-town ambient state. It lives behind a lock with an
//! explicit setter, and defaults to a sentinel that no real server listens
//! on, so operations performed before a town is configured fail loudly
//! instead of silently reaching the user's personal tmux server.

use parking_lot::RwLock;

/// Sentinel socket used when no town has been configured.
pub const UNCONFIGURED_SOCKET: &str = "derrick-unconfigured";

static DEFAULT_SOCKET: RwLock<Option<String>> = RwLock::new(None);

/// Set the process-wide default socket name.
pub fn set_default_socket(name: impl Into<String>) {
    *DEFAULT_SOCKET.write() = Some(name.into());
}

/// Read the process-wide default socket name.
pub fn default_socket() -> String {
    DEFAULT_SOCKET
        .read()
        .clone()
        .unwrap_or_else(|| UNCONFIGURED_SOCKET.to_string())
}

#[cfg(test)]
#[path = "socket_tests.rs"]
mod tests;
