// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Subprocess execution helpers

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Default timeout for tmux commands.
pub const TMUX_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for tracker (`bd`) commands.
pub const TRACKER_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for git plumbing commands.
pub const GIT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default timeout for `ps` snapshots.
pub const PS_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for mail router sends.
pub const MAIL_TIMEOUT: Duration = Duration::from_secs(15);

/// Default per-gate timeout when a gate does not set its own.
pub const GATE_TIMEOUT: Duration = Duration::from_secs(600);

/// Run a subprocess command with a timeout.
///
/// Wraps `Command::output()` with `tokio::time::timeout`, converting
/// timeout expiration into a descriptive error message. The child process
/// is killed automatically if the timeout elapses (via the tokio `Child`
/// drop implementation).
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, String> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(format!("{} failed: {}", description, io_err)),
        Err(_elapsed) => Err(format!(
            "{} timed out after {}s",
            description,
            timeout.as_secs()
        )),
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
