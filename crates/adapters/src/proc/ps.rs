// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Process table backed by `ps` snapshots and `nix` signals.

use super::{ProcEntry, ProcError, ProcSnapshot, ProcessTable, TermSignal};
use crate::subprocess::{run_with_timeout, PS_TIMEOUT};
use async_trait::async_trait;
use tokio::process::Command;

/// Real process table.
#[derive(Clone, Copy, Default)]
pub struct PsProcessTable;

impl PsProcessTable {
    pub fn new() -> Self {
        Self
    }

    fn parse_table(stdout: &str) -> Vec<ProcEntry> {
        let mut entries = Vec::new();
        for line in stdout.lines() {
            let mut fields = line.split_whitespace();
            let (Some(pid), Some(ppid), Some(pgid)) = (
                fields.next().and_then(|f| f.parse().ok()),
                fields.next().and_then(|f| f.parse().ok()),
                fields.next().and_then(|f| f.parse().ok()),
            ) else {
                continue;
            };
            // comm may contain spaces; keep the remainder intact.
            let comm = fields.collect::<Vec<_>>().join(" ");
            entries.push(ProcEntry {
                pid,
                ppid,
                pgid,
                comm,
            });
        }
        entries
    }
}

#[async_trait]
impl ProcessTable for PsProcessTable {
    async fn snapshot(&self) -> Result<ProcSnapshot, ProcError> {
        let mut cmd = Command::new("ps");
        cmd.args(["-eo", "pid=,ppid=,pgid=,comm="]);
        let output = run_with_timeout(cmd, PS_TIMEOUT, "ps")
            .await
            .map_err(ProcError::Unavailable)?;
        if !output.status.success() {
            return Err(ProcError::Unavailable(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(ProcSnapshot::from_entries(Self::parse_table(&stdout)))
    }

    async fn exe_basename(&self, pid: i32) -> Option<String> {
        // /proc is authoritative where it exists (handles argv[0] rewrites).
        let link = format!("/proc/{}/exe", pid);
        if let Ok(path) = tokio::fs::read_link(&link).await {
            return path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
        }
        // Portable fallback.
        let mut cmd = Command::new("ps");
        cmd.args(["-o", "comm=", "-p", &pid.to_string()]);
        let output = run_with_timeout(cmd, PS_TIMEOUT, "ps -o comm=").await.ok()?;
        if !output.status.success() {
            return None;
        }
        let comm = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if comm.is_empty() {
            return None;
        }
        Some(
            comm.rsplit('/')
                .next()
                .unwrap_or(comm.as_str())
                .to_string(),
        )
    }

    #[cfg(unix)]
    async fn signal(&self, pid: i32, signal: TermSignal) {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;
        let sig = match signal {
            TermSignal::Term => Signal::SIGTERM,
            TermSignal::Kill => Signal::SIGKILL,
        };
        // ESRCH (already gone) is the common, uninteresting case.
        if let Err(errno) = kill(Pid::from_raw(pid), sig) {
            if errno != nix::errno::Errno::ESRCH {
                tracing::debug!(pid, signal = ?sig, error = %errno, "signal delivery failed");
            }
        }
    }

    #[cfg(not(unix))]
    async fn signal(&self, _pid: i32, _signal: TermSignal) {}
}

#[cfg(test)]
#[path = "ps_tests.rs"]
mod tests;
