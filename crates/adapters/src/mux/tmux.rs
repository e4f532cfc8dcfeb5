// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Tmux implementation of [`MuxAdapter`].
//!
//! Every operation shells out to `tmux -L <socket>`. Structural failures
//! (no server, missing session) are recognized from stderr and mapped to
//! named errors; everything else surfaces as `CommandFailed`.

use super::{MuxAdapter, MuxError, PaneInfo};
use crate::subprocess::{run_with_timeout, TMUX_TIMEOUT};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::process::Output;
use tokio::process::Command;

/// Tmux adapter bound to a named server socket.
#[derive(Clone)]
pub struct TmuxMux {
    socket: String,
}

impl TmuxMux {
    pub fn new(socket: impl Into<String>) -> Self {
        Self {
            socket: socket.into(),
        }
    }

    /// Bind to the process-wide default socket.
    pub fn with_default_socket() -> Self {
        Self::new(super::default_socket())
    }

    pub fn socket(&self) -> &str {
        &self.socket
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("tmux");
        cmd.arg("-L").arg(&self.socket);
        cmd
    }

    fn classify(&self, stderr: &str, target: &str) -> MuxError {
        let line = stderr.trim();
        if line.contains("no server running") || line.contains("error connecting to") {
            MuxError::NoServer(self.socket.clone())
        } else if line.contains("can't find session")
            || line.contains("session not found")
            || line.contains("can't find pane")
            || line.contains("can't find window")
        {
            MuxError::SessionNotFound(target.to_string())
        } else if line.contains("duplicate session") {
            MuxError::SessionExists(target.to_string())
        } else {
            MuxError::CommandFailed(line.to_string())
        }
    }

    async fn run(&self, args: &[&str], target: &str, desc: &str) -> Result<Output, MuxError> {
        let mut cmd = self.command();
        cmd.args(args);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, desc)
            .await
            .map_err(MuxError::CommandFailed)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.classify(&stderr, target));
        }
        Ok(output)
    }

    async fn display(&self, target: &str, format: &str) -> Result<String, MuxError> {
        let output = self
            .run(
                &["display-message", "-p", "-t", target, format],
                target,
                "tmux display-message",
            )
            .await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl MuxAdapter for TmuxMux {
    fn socket_hint(&self) -> &str {
        &self.socket
    }

    async fn has_session(&self, name: &str) -> Result<bool, MuxError> {
        let mut cmd = self.command();
        cmd.args(["has-session", "-t", &exact(name)]);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux has-session")
            .await
            .map_err(MuxError::CommandFailed)?;
        Ok(output.status.success())
    }

    async fn create_session(&self, name: &str, cwd: &Path) -> Result<(), MuxError> {
        // Precondition: cwd must exist
        if !cwd.is_dir() {
            return Err(MuxError::SpawnFailed(format!(
                "working directory does not exist: {}",
                cwd.display()
            )));
        }
        let mut cmd = self.command();
        cmd.arg("new-session")
            .arg("-d")
            .arg("-s")
            .arg(name)
            .arg("-c")
            .arg(cwd);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux new-session")
            .await
            .map_err(MuxError::SpawnFailed)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let err = self.classify(&stderr, name);
            return match err {
                MuxError::SessionExists(_) => Err(err),
                MuxError::NoServer(_) => Err(err),
                _ => Err(MuxError::SpawnFailed(stderr.trim().to_string())),
            };
        }
        Ok(())
    }

    async fn kill_session(&self, name: &str) -> Result<(), MuxError> {
        let mut cmd = self.command();
        cmd.args(["kill-session", "-t", &exact(name)]);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux kill-session")
            .await
            .map_err(MuxError::CommandFailed)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            match self.classify(&stderr, name) {
                // Absent session or absent server: nothing to kill.
                MuxError::SessionNotFound(_) | MuxError::NoServer(_) => return Ok(()),
                err => return Err(err),
            }
        }
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<String>, MuxError> {
        let mut cmd = self.command();
        cmd.args(["list-sessions", "-F", "#{session_name}"]);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux list-sessions")
            .await
            .map_err(MuxError::CommandFailed)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            match self.classify(&stderr, "") {
                MuxError::NoServer(_) => return Ok(Vec::new()),
                err => return Err(err),
            }
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    async fn set_remain_on_exit(&self, name: &str, on: bool) -> Result<(), MuxError> {
        let value = if on { "on" } else { "off" };
        self.run(
            &["set-option", "-t", &exact(name), "remain-on-exit", value],
            name,
            "tmux set-option remain-on-exit",
        )
        .await?;
        Ok(())
    }

    async fn set_option(&self, name: &str, option: &str, value: &str) -> Result<(), MuxError> {
        self.run(
            &["set-option", "-t", &exact(name), option, value],
            name,
            "tmux set-option",
        )
        .await?;
        Ok(())
    }

    async fn set_env(&self, name: &str, key: &str, value: &str) -> Result<(), MuxError> {
        self.run(
            &["set-environment", "-t", &exact(name), key, value],
            name,
            "tmux set-environment",
        )
        .await?;
        Ok(())
    }

    async fn show_env(&self, name: &str, key: &str) -> Result<Option<String>, MuxError> {
        let mut cmd = self.command();
        cmd.args(["show-environment", "-t", &exact(name), key]);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux show-environment")
            .await
            .map_err(MuxError::CommandFailed)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("unknown variable") {
                return Ok(None);
            }
            return Err(self.classify(&stderr, name));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        // Output is "KEY=value"; unset variables print "-KEY".
        match stdout.trim().split_once('=') {
            Some((_, value)) => Ok(Some(value.to_string())),
            None => Ok(None),
        }
    }

    async fn respawn_pane(&self, target: &str, command: &str) -> Result<(), MuxError> {
        self.run(
            &["respawn-pane", "-k", "-t", target, command],
            target,
            "tmux respawn-pane",
        )
        .await?;
        Ok(())
    }

    async fn send_literal(&self, target: &str, text: &str) -> Result<(), MuxError> {
        // -l = literal mode (no key name interpretation)
        // -- = end of options (handles text starting with -)
        self.run(
            &["send-keys", "-t", target, "-l", "--", text],
            target,
            "tmux send-keys -l",
        )
        .await?;
        Ok(())
    }

    async fn send_key(&self, target: &str, key: &str) -> Result<(), MuxError> {
        self.run(&["send-keys", "-t", target, key], target, "tmux send-keys")
            .await?;
        Ok(())
    }

    async fn exit_copy_mode(&self, target: &str) -> Result<(), MuxError> {
        let mut cmd = self.command();
        cmd.args(["send-keys", "-t", target, "-X", "cancel"]);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux send-keys -X cancel")
            .await
            .map_err(MuxError::CommandFailed)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // Not being in a mode is the desired state.
            if stderr.contains("not in a mode") {
                return Ok(());
            }
            return Err(self.classify(&stderr, target));
        }
        Ok(())
    }

    async fn capture_last_lines(&self, target: &str, lines: u32) -> Result<String, MuxError> {
        let start = format!("-{}", lines);
        let output = self
            .run(
                &["capture-pane", "-p", "-t", target, "-S", &start],
                target,
                "tmux capture-pane",
            )
            .await?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn list_panes(&self, session: &str) -> Result<Vec<PaneInfo>, MuxError> {
        let output = self
            .run(
                &[
                    "list-panes",
                    "-s",
                    "-t",
                    &exact(session),
                    "-F",
                    "#{window_index},#{pane_id},#{pane_pid},#{pane_current_command}",
                ],
                session,
                "tmux list-panes",
            )
            .await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut panes = Vec::new();
        for line in stdout.lines() {
            let mut parts = line.splitn(4, ',');
            let window_index = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            let id = parts.next().unwrap_or_default().to_string();
            let pid = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            let current_command = parts.next().unwrap_or_default().to_string();
            if !id.is_empty() {
                panes.push(PaneInfo {
                    id,
                    window_index,
                    pid,
                    current_command,
                });
            }
        }
        Ok(panes)
    }

    async fn session_attached(&self, name: &str) -> Result<bool, MuxError> {
        let value = self.display(&exact(name), "#{session_attached}").await?;
        Ok(value.parse::<u32>().map(|n| n > 0).unwrap_or(false))
    }

    async fn session_activity(&self, name: &str) -> Result<DateTime<Utc>, MuxError> {
        let value = self.display(&exact(name), "#{session_activity}").await?;
        let secs: i64 = value
            .parse()
            .map_err(|_| MuxError::CommandFailed(format!("bad session_activity: {:?}", value)))?;
        DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| MuxError::CommandFailed(format!("bad session_activity: {:?}", value)))
    }

    async fn pane_pid(&self, target: &str) -> Result<i32, MuxError> {
        let value = self.display(target, "#{pane_pid}").await?;
        value
            .parse()
            .map_err(|_| MuxError::CommandFailed(format!("bad pane_pid: {:?}", value)))
    }

    async fn pane_dead(&self, target: &str) -> Result<Option<i32>, MuxError> {
        let value = self
            .display(target, "#{pane_dead},#{pane_dead_status}")
            .await?;
        let (dead, status) = value.split_once(',').unwrap_or((value.as_str(), ""));
        if dead != "1" {
            return Ok(None);
        }
        Ok(Some(status.parse().unwrap_or(-1)))
    }

    async fn pane_in_mode(&self, target: &str) -> Result<bool, MuxError> {
        let value = self.display(target, "#{pane_in_mode}").await?;
        Ok(value == "1")
    }

    async fn pane_current_command(&self, target: &str) -> Result<String, MuxError> {
        self.display(target, "#{pane_current_command}").await
    }

    async fn window_size(&self, name: &str) -> Result<(u32, u32), MuxError> {
        let value = self
            .display(&exact(name), "#{window_width},#{window_height}")
            .await?;
        let (w, h) = value
            .split_once(',')
            .ok_or_else(|| MuxError::CommandFailed(format!("bad window size: {:?}", value)))?;
        match (w.parse(), h.parse()) {
            (Ok(w), Ok(h)) => Ok((w, h)),
            _ => Err(MuxError::CommandFailed(format!(
                "bad window size: {:?}",
                value
            ))),
        }
    }

    async fn resize_window(&self, name: &str, width: u32, height: u32) -> Result<(), MuxError> {
        let w = width.to_string();
        let h = height.to_string();
        self.run(
            &["resize-window", "-t", &exact(name), "-x", &w, "-y", &h],
            name,
            "tmux resize-window",
        )
        .await?;
        Ok(())
    }

    async fn set_pane_died_hook(&self, name: &str, command: &str) -> Result<(), MuxError> {
        self.run(
            &["set-hook", "-t", &exact(name), "pane-died", command],
            name,
            "tmux set-hook",
        )
        .await?;
        Ok(())
    }

    async fn clear_pane_died_hook(&self, name: &str) -> Result<(), MuxError> {
        self.run(
            &["set-hook", "-u", "-t", &exact(name), "pane-died"],
            name,
            "tmux set-hook -u",
        )
        .await?;
        Ok(())
    }
}

/// Exact-match session target. Bare names are prefix-matched by tmux; the
/// leading `=` pins the lookup to the literal name.
fn exact(name: &str) -> String {
    format!("={}", name)
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
