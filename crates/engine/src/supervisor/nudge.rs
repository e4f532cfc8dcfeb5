// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Input injection ("nudge").
//!
//! Delivering text to an agent TUI is the most delicate operation the
//! supervisor performs; the sequence below is load-bearing and ordered.

use super::{Supervisor, SupervisorError};
use dk_adapters::{MuxAdapter, ProcessTable};
use dk_core::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Acquiring the per-target lock past this means the multiplexer (or a
/// previous nudge) is wedged; fail rather than block forever.
const NUDGE_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Literal sends are chunked at this many bytes.
const CHUNK_MAX_BYTES: usize = 512;
const INTER_CHUNK_DELAY: Duration = Duration::from_millis(10);
const COPY_MODE_SETTLE: Duration = Duration::from_millis(50);
/// Let the TUI finish ingesting the paste before any key presses.
const PASTE_SETTLE: Duration = Duration::from_millis(500);
/// Must exceed the shell readline ESC-sequence timeout, or the ESC gets
/// coalesced with the following submit key into a meta prefix.
const ESC_COALESCE_GUARD: Duration = Duration::from_millis(600);
const SUBMIT_ATTEMPTS: u32 = 3;
const SUBMIT_RETRY_DELAY: Duration = Duration::from_millis(200);
/// First-chunk retry loop against transient "not in a mode" TUI states.
const FIRST_CHUNK_BACKOFF_START: Duration = Duration::from_millis(500);
const FIRST_CHUNK_BACKOFF_CAP: Duration = Duration::from_secs(2);
const FIRST_CHUNK_DEADLINE: Duration = Duration::from_secs(10);

/// Drop control characters except newline, replace TAB with a space, strip
/// DEL. Everything else — quotes, backticks, Unicode — passes through
/// byte-for-byte.
pub fn sanitize_nudge(message: &str) -> String {
    message
        .chars()
        .filter_map(|c| match c {
            '\t' => Some(' '),
            '\n' => Some('\n'),
            '\u{7f}' => None,
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

/// Split at char boundaries into chunks of at most [`CHUNK_MAX_BYTES`] bytes.
fn chunk_message(message: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for c in message.chars() {
        if current.len() + c.len_utf8() > CHUNK_MAX_BYTES {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

impl<M: MuxAdapter, P: ProcessTable, C: Clock> Supervisor<M, P, C> {
    /// Deliver `message` plus a submit key to a session or pane.
    pub async fn nudge(&self, target: &str, message: &str) -> Result<(), SupervisorError> {
        // 1. Per-target serialization with a bounded wait.
        let semaphore = {
            let mut locks = self.nudge_locks.lock();
            Arc::clone(
                locks
                    .entry(target.to_string())
                    .or_insert_with(|| Arc::new(Semaphore::new(1))),
            )
        };
        let _permit = tokio::time::timeout(NUDGE_LOCK_TIMEOUT, semaphore.acquire_owned())
            .await
            .map_err(|_| SupervisorError::HungLock {
                session: target.to_string(),
                timeout: NUDGE_LOCK_TIMEOUT,
            })?
            .map_err(|_| SupervisorError::HungLock {
                session: target.to_string(),
                timeout: NUDGE_LOCK_TIMEOUT,
            })?;

        // 2. Resolve the agent pane in multi-pane sessions.
        let is_pane_target = target.starts_with('%');
        let send_target = if is_pane_target {
            target.to_string()
        } else {
            self.resolve_agent_pane(target).await?
        };

        // 3. A pane stuck in copy/scroll mode swallows literal sends.
        if self.mux.pane_in_mode(&send_target).await? {
            self.mux.exit_copy_mode(&send_target).await?;
            tokio::time::sleep(COPY_MODE_SETTLE).await;
        }

        // 4-5. Sanitize and send the text.
        let sanitized = sanitize_nudge(message);
        let chunks = chunk_message(&sanitized);
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                self.send_first_chunk(&send_target, chunk).await?;
            } else {
                tokio::time::sleep(INTER_CHUNK_DELAY).await;
                self.mux.send_literal(&send_target, chunk).await?;
            }
        }

        // 6. Let the paste settle.
        tokio::time::sleep(PASTE_SETTLE).await;

        // 7. ESC is harmless in normal mode and exits vim insert mode.
        self.mux.send_key(&send_target, "Escape").await?;

        // 8. See ESC_COALESCE_GUARD.
        tokio::time::sleep(ESC_COALESCE_GUARD).await;

        // 9. Submit, with retries.
        self.send_submit(&send_target).await?;

        // 10. Detached TUIs may not repaint on input alone; a one-pixel
        // resize wiggle delivers a terminal-size-change signal.
        if !is_pane_target {
            self.wake_if_detached(target).await;
        }

        tracing::debug!(target, bytes = sanitized.len(), "nudge delivered");
        Ok(())
    }

    /// In a multi-pane session, pick the pane running the agent.
    async fn resolve_agent_pane(&self, session: &str) -> Result<String, SupervisorError> {
        let panes = self.mux.list_panes(session).await?;
        if panes.len() <= 1 {
            return Ok(session.to_string());
        }
        let agent_pane = panes
            .iter()
            .find(|p| {
                self.config
                    .agent_proc_names
                    .iter()
                    .any(|n| *n == p.current_command)
            })
            .or_else(|| panes.first());
        Ok(agent_pane
            .map(|p| p.id.clone())
            .unwrap_or_else(|| session.to_string()))
    }

    /// The first chunk retries through transient TUI states with capped
    /// exponential backoff; structural errors surface immediately.
    async fn send_first_chunk(&self, target: &str, chunk: &str) -> Result<(), SupervisorError> {
        let deadline = tokio::time::Instant::now() + FIRST_CHUNK_DEADLINE;
        let mut backoff = FIRST_CHUNK_BACKOFF_START;
        loop {
            match self.mux.send_literal(target, chunk).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_structural() => return Err(err.into()),
                Err(err) => {
                    if tokio::time::Instant::now() + backoff > deadline {
                        return Err(err.into());
                    }
                    tracing::debug!(target, error = %err, "transient send failure, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 3 / 2).min(FIRST_CHUNK_BACKOFF_CAP);
                }
            }
        }
    }

    async fn send_submit(&self, target: &str) -> Result<(), SupervisorError> {
        let mut last_err = None;
        for attempt in 0..SUBMIT_ATTEMPTS {
            match self.mux.send_key(target, "Enter").await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_structural() => return Err(err.into()),
                Err(err) => {
                    last_err = Some(err);
                    if attempt + 1 < SUBMIT_ATTEMPTS {
                        tokio::time::sleep(SUBMIT_RETRY_DELAY).await;
                    }
                }
            }
        }
        Err(last_err
            .map(SupervisorError::from)
            .unwrap_or(SupervisorError::NoServer))
    }

    /// One pixel down and back up; best-effort.
    async fn wake_if_detached(&self, session: &str) {
        let attached = match self.mux.session_attached(session).await {
            Ok(attached) => attached,
            Err(_) => return,
        };
        if attached {
            return;
        }
        if let Ok((width, height)) = self.mux.window_size(session).await {
            if height > 1 {
                let _ = self.mux.resize_window(session, width, height - 1).await;
                let _ = self.mux.resize_window(session, width, height).await;
            }
        }
    }
}

#[cfg(test)]
#[path = "nudge_tests.rs"]
mod tests;
