// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Fake multiplexer adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{MuxAdapter, MuxError, PaneInfo};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Recorded multiplexer call
#[derive(Debug, Clone, PartialEq)]
pub enum MuxCall {
    CreateSession { name: String },
    KillSession { name: String },
    RespawnPane { target: String, command: String },
    SendLiteral { target: String, text: String },
    SendKey { target: String, key: String },
    ExitCopyMode { target: String },
    SetEnv { name: String, key: String, value: String },
    SetRemainOnExit { name: String, on: bool },
    SetOption { name: String, option: String, value: String },
    ResizeWindow { name: String, width: u32, height: u32 },
    SetPaneDiedHook { name: String, command: String },
    ClearPaneDiedHook { name: String },
}

/// One pane of a fake session
#[derive(Debug, Clone)]
pub struct FakePane {
    pub id: String,
    pub window_index: u32,
    pub pid: i32,
    pub current_command: String,
    /// `Some(status)` once the pane process has exited.
    pub dead: Option<i32>,
    pub in_mode: bool,
}

/// Fake session state
#[derive(Debug, Clone)]
pub struct FakeSession {
    pub name: String,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
    pub panes: Vec<FakePane>,
    pub attached: bool,
    pub activity: DateTime<Utc>,
    pub remain_on_exit: bool,
    pub pane_died_hook: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Session options set via set-option.
    pub options: BTreeMap<String, String>,
    /// Screen content for capture-pane.
    pub screen: Vec<String>,
}

struct FakeMuxState {
    sessions: HashMap<String, FakeSession>,
    calls: Vec<MuxCall>,
    next_pane: u64,
    /// Per-target count of send_literal calls that fail transiently.
    literal_failures: HashMap<String, u32>,
    /// Exit status a respawned pane immediately dies with, per session.
    respawn_dies: HashMap<String, i32>,
    server_down: bool,
}

/// Fake multiplexer adapter for testing
#[derive(Clone)]
pub struct FakeMux {
    inner: Arc<Mutex<FakeMuxState>>,
}

impl Default for FakeMux {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeMuxState {
                sessions: HashMap::new(),
                calls: Vec::new(),
                next_pane: 0,
                literal_failures: HashMap::new(),
                respawn_dies: HashMap::new(),
                server_down: false,
            })),
        }
    }
}

impl FakeMux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<MuxCall> {
        self.inner.lock().calls.clone()
    }

    /// Literal text sent to a target, in order.
    pub fn sent_literals(&self, target: &str) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                MuxCall::SendLiteral { target: t, text } if t == target => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Named keys sent to a target, in order.
    pub fn sent_keys(&self, target: &str) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                MuxCall::SendKey { target: t, key } if t == target => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    /// Get a session by name
    pub fn get_session(&self, name: &str) -> Option<FakeSession> {
        self.inner.lock().sessions.get(name).cloned()
    }

    /// Add a pre-existing session with a single shell pane.
    pub fn add_session(&self, name: &str) -> Self {
        let mut inner = self.inner.lock();
        let pane = Self::make_pane(&mut inner, "bash");
        inner.sessions.insert(
            name.to_string(),
            FakeSession {
                name: name.to_string(),
                cwd: PathBuf::from("/tmp"),
                env: BTreeMap::new(),
                panes: vec![pane],
                attached: false,
                activity: Utc::now(),
                remain_on_exit: false,
                pane_died_hook: None,
                width: 200,
                height: 50,
                options: BTreeMap::new(),
                screen: Vec::new(),
            },
        );
        drop(inner);
        self.clone()
    }

    /// Add an extra pane to a session's window.
    pub fn add_pane(&self, name: &str, window_index: u32, command: &str) -> Option<String> {
        let mut inner = self.inner.lock();
        let mut pane = Self::make_pane(&mut inner, command);
        pane.window_index = window_index;
        let id = pane.id.clone();
        inner.sessions.get_mut(name)?.panes.push(pane);
        Some(id)
    }

    fn make_pane(state: &mut FakeMuxState, command: &str) -> FakePane {
        state.next_pane += 1;
        FakePane {
            id: format!("%{}", state.next_pane),
            window_index: 0,
            pid: 10_000 + state.next_pane as i32,
            current_command: command.to_string(),
            dead: None,
            in_mode: false,
        }
    }

    pub fn set_attached(&self, name: &str, attached: bool) {
        if let Some(s) = self.inner.lock().sessions.get_mut(name) {
            s.attached = attached;
        }
    }

    pub fn set_activity(&self, name: &str, at: DateTime<Utc>) {
        if let Some(s) = self.inner.lock().sessions.get_mut(name) {
            s.activity = at;
        }
    }

    pub fn set_screen(&self, name: &str, lines: &[&str]) {
        if let Some(s) = self.inner.lock().sessions.get_mut(name) {
            s.screen = lines.iter().map(|l| l.to_string()).collect();
        }
    }

    pub fn set_env_var(&self, name: &str, key: &str, value: &str) {
        if let Some(s) = self.inner.lock().sessions.get_mut(name) {
            s.env.insert(key.to_string(), value.to_string());
        }
    }

    pub fn set_pane_command(&self, name: &str, pane_idx: usize, command: &str) {
        if let Some(s) = self.inner.lock().sessions.get_mut(name) {
            if let Some(p) = s.panes.get_mut(pane_idx) {
                p.current_command = command.to_string();
            }
        }
    }

    pub fn set_pane_dead(&self, name: &str, pane_idx: usize, status: i32) {
        if let Some(s) = self.inner.lock().sessions.get_mut(name) {
            if let Some(p) = s.panes.get_mut(pane_idx) {
                p.dead = Some(status);
            }
        }
    }

    pub fn set_pane_in_mode(&self, name: &str, pane_idx: usize, in_mode: bool) {
        if let Some(s) = self.inner.lock().sessions.get_mut(name) {
            if let Some(p) = s.panes.get_mut(pane_idx) {
                p.in_mode = in_mode;
            }
        }
    }

    /// Make the next `count` send_literal calls to `target` fail with the
    /// transient "pane not in a mode" error.
    pub fn fail_literal_sends(&self, target: &str, count: u32) {
        self.inner
            .lock()
            .literal_failures
            .insert(target.to_string(), count);
    }

    /// Make the next respawned pane in `name` exit immediately with `status`.
    pub fn set_respawn_dies(&self, name: &str, status: i32) {
        self.inner
            .lock()
            .respawn_dies
            .insert(name.to_string(), status);
    }

    /// Simulate the whole server being down.
    pub fn set_server_down(&self, down: bool) {
        self.inner.lock().server_down = down;
    }

    fn resolve_session<'a>(
        state: &'a mut FakeMuxState,
        target: &str,
    ) -> Result<&'a mut FakeSession, MuxError> {
        let name = target.strip_prefix('=').unwrap_or(target);
        if name.starts_with('%') {
            let owner = state
                .sessions
                .iter()
                .find(|(_, s)| s.panes.iter().any(|p| p.id == name))
                .map(|(n, _)| n.clone());
            return match owner {
                Some(owner) => state
                    .sessions
                    .get_mut(&owner)
                    .ok_or_else(|| MuxError::SessionNotFound(target.to_string())),
                None => Err(MuxError::SessionNotFound(target.to_string())),
            };
        }
        state
            .sessions
            .get_mut(name)
            .ok_or_else(|| MuxError::SessionNotFound(name.to_string()))
    }

    fn resolve_pane_index(session: &FakeSession, target: &str) -> usize {
        let name = target.strip_prefix('=').unwrap_or(target);
        if name.starts_with('%') {
            session
                .panes
                .iter()
                .position(|p| p.id == name)
                .unwrap_or(0)
        } else {
            0
        }
    }

    fn check_server(state: &FakeMuxState) -> Result<(), MuxError> {
        if state.server_down {
            return Err(MuxError::NoServer("fake".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MuxAdapter for FakeMux {
    fn socket_hint(&self) -> &str {
        "fake"
    }

    async fn has_session(&self, name: &str) -> Result<bool, MuxError> {
        let state = self.inner.lock();
        Self::check_server(&state)?;
        Ok(state
            .sessions
            .contains_key(name.strip_prefix('=').unwrap_or(name)))
    }

    async fn create_session(&self, name: &str, cwd: &Path) -> Result<(), MuxError> {
        let mut state = self.inner.lock();
        Self::check_server(&state)?;
        state.calls.push(MuxCall::CreateSession {
            name: name.to_string(),
        });
        if state.sessions.contains_key(name) {
            return Err(MuxError::SessionExists(name.to_string()));
        }
        let pane = Self::make_pane(&mut state, "bash");
        state.sessions.insert(
            name.to_string(),
            FakeSession {
                name: name.to_string(),
                cwd: cwd.to_path_buf(),
                env: BTreeMap::new(),
                panes: vec![pane],
                attached: false,
                activity: Utc::now(),
                remain_on_exit: false,
                pane_died_hook: None,
                width: 200,
                height: 50,
                options: BTreeMap::new(),
                screen: Vec::new(),
            },
        );
        Ok(())
    }

    async fn kill_session(&self, name: &str) -> Result<(), MuxError> {
        let mut state = self.inner.lock();
        state.calls.push(MuxCall::KillSession {
            name: name.to_string(),
        });
        state.sessions.remove(name.strip_prefix('=').unwrap_or(name));
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<String>, MuxError> {
        let state = self.inner.lock();
        if state.server_down {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = state.sessions.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn set_remain_on_exit(&self, name: &str, on: bool) -> Result<(), MuxError> {
        let mut state = self.inner.lock();
        Self::check_server(&state)?;
        state.calls.push(MuxCall::SetRemainOnExit {
            name: name.to_string(),
            on,
        });
        let session = Self::resolve_session(&mut state, name)?;
        session.remain_on_exit = on;
        Ok(())
    }

    async fn set_option(&self, name: &str, option: &str, value: &str) -> Result<(), MuxError> {
        let mut state = self.inner.lock();
        Self::check_server(&state)?;
        state.calls.push(MuxCall::SetOption {
            name: name.to_string(),
            option: option.to_string(),
            value: value.to_string(),
        });
        let session = Self::resolve_session(&mut state, name)?;
        session
            .options
            .insert(option.to_string(), value.to_string());
        Ok(())
    }

    async fn set_env(&self, name: &str, key: &str, value: &str) -> Result<(), MuxError> {
        let mut state = self.inner.lock();
        Self::check_server(&state)?;
        state.calls.push(MuxCall::SetEnv {
            name: name.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        });
        let session = Self::resolve_session(&mut state, name)?;
        session.env.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn show_env(&self, name: &str, key: &str) -> Result<Option<String>, MuxError> {
        let mut state = self.inner.lock();
        Self::check_server(&state)?;
        let session = Self::resolve_session(&mut state, name)?;
        Ok(session.env.get(key).cloned())
    }

    async fn respawn_pane(&self, target: &str, command: &str) -> Result<(), MuxError> {
        let mut state = self.inner.lock();
        Self::check_server(&state)?;
        state.calls.push(MuxCall::RespawnPane {
            target: target.to_string(),
            command: command.to_string(),
        });
        let dies = Self::resolve_session(&mut state, target)
            .map(|s| s.name.clone())
            .ok()
            .and_then(|name| state.respawn_dies.get(&name).copied());
        let session = Self::resolve_session(&mut state, target)?;
        let idx = Self::resolve_pane_index(session, target);
        let program = command.split_whitespace().next().unwrap_or("sh").to_string();
        if let Some(pane) = session.panes.get_mut(idx) {
            pane.current_command = program;
            pane.dead = dies;
        }
        Ok(())
    }

    async fn send_literal(&self, target: &str, text: &str) -> Result<(), MuxError> {
        let mut state = self.inner.lock();
        Self::check_server(&state)?;
        if let Some(remaining) = state.literal_failures.get_mut(target) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(MuxError::CommandFailed("pane not in a mode".to_string()));
            }
        }
        state.calls.push(MuxCall::SendLiteral {
            target: target.to_string(),
            text: text.to_string(),
        });
        Self::resolve_session(&mut state, target)?;
        Ok(())
    }

    async fn send_key(&self, target: &str, key: &str) -> Result<(), MuxError> {
        let mut state = self.inner.lock();
        Self::check_server(&state)?;
        state.calls.push(MuxCall::SendKey {
            target: target.to_string(),
            key: key.to_string(),
        });
        Self::resolve_session(&mut state, target)?;
        Ok(())
    }

    async fn exit_copy_mode(&self, target: &str) -> Result<(), MuxError> {
        let mut state = self.inner.lock();
        Self::check_server(&state)?;
        state.calls.push(MuxCall::ExitCopyMode {
            target: target.to_string(),
        });
        let session = Self::resolve_session(&mut state, target)?;
        let idx = Self::resolve_pane_index(session, target);
        if let Some(pane) = session.panes.get_mut(idx) {
            pane.in_mode = false;
        }
        Ok(())
    }

    async fn capture_last_lines(&self, target: &str, lines: u32) -> Result<String, MuxError> {
        let mut state = self.inner.lock();
        Self::check_server(&state)?;
        let session = Self::resolve_session(&mut state, target)?;
        let start = session.screen.len().saturating_sub(lines as usize);
        Ok(session.screen[start..].join("\n"))
    }

    async fn list_panes(&self, session: &str) -> Result<Vec<PaneInfo>, MuxError> {
        let mut state = self.inner.lock();
        Self::check_server(&state)?;
        let session = Self::resolve_session(&mut state, session)?;
        Ok(session
            .panes
            .iter()
            .map(|p| PaneInfo {
                id: p.id.clone(),
                window_index: p.window_index,
                pid: p.pid,
                current_command: p.current_command.clone(),
            })
            .collect())
    }

    async fn session_attached(&self, name: &str) -> Result<bool, MuxError> {
        let mut state = self.inner.lock();
        Self::check_server(&state)?;
        Ok(Self::resolve_session(&mut state, name)?.attached)
    }

    async fn session_activity(&self, name: &str) -> Result<DateTime<Utc>, MuxError> {
        let mut state = self.inner.lock();
        Self::check_server(&state)?;
        Ok(Self::resolve_session(&mut state, name)?.activity)
    }

    async fn pane_pid(&self, target: &str) -> Result<i32, MuxError> {
        let mut state = self.inner.lock();
        Self::check_server(&state)?;
        let session = Self::resolve_session(&mut state, target)?;
        let idx = Self::resolve_pane_index(session, target);
        session
            .panes
            .get(idx)
            .map(|p| p.pid)
            .ok_or_else(|| MuxError::SessionNotFound(target.to_string()))
    }

    async fn pane_dead(&self, target: &str) -> Result<Option<i32>, MuxError> {
        let mut state = self.inner.lock();
        Self::check_server(&state)?;
        let session = Self::resolve_session(&mut state, target)?;
        let idx = Self::resolve_pane_index(session, target);
        Ok(session.panes.get(idx).and_then(|p| p.dead))
    }

    async fn pane_in_mode(&self, target: &str) -> Result<bool, MuxError> {
        let mut state = self.inner.lock();
        Self::check_server(&state)?;
        let session = Self::resolve_session(&mut state, target)?;
        let idx = Self::resolve_pane_index(session, target);
        Ok(session.panes.get(idx).map(|p| p.in_mode).unwrap_or(false))
    }

    async fn pane_current_command(&self, target: &str) -> Result<String, MuxError> {
        let mut state = self.inner.lock();
        Self::check_server(&state)?;
        let session = Self::resolve_session(&mut state, target)?;
        let idx = Self::resolve_pane_index(session, target);
        Ok(session
            .panes
            .get(idx)
            .map(|p| p.current_command.clone())
            .unwrap_or_default())
    }

    async fn window_size(&self, name: &str) -> Result<(u32, u32), MuxError> {
        let mut state = self.inner.lock();
        Self::check_server(&state)?;
        let session = Self::resolve_session(&mut state, name)?;
        Ok((session.width, session.height))
    }

    async fn resize_window(&self, name: &str, width: u32, height: u32) -> Result<(), MuxError> {
        let mut state = self.inner.lock();
        Self::check_server(&state)?;
        state.calls.push(MuxCall::ResizeWindow {
            name: name.to_string(),
            width,
            height,
        });
        let session = Self::resolve_session(&mut state, name)?;
        session.width = width;
        session.height = height;
        Ok(())
    }

    async fn set_pane_died_hook(&self, name: &str, command: &str) -> Result<(), MuxError> {
        let mut state = self.inner.lock();
        Self::check_server(&state)?;
        state.calls.push(MuxCall::SetPaneDiedHook {
            name: name.to_string(),
            command: command.to_string(),
        });
        let session = Self::resolve_session(&mut state, name)?;
        session.pane_died_hook = Some(command.to_string());
        Ok(())
    }

    async fn clear_pane_died_hook(&self, name: &str) -> Result<(), MuxError> {
        let mut state = self.inner.lock();
        Self::check_server(&state)?;
        state.calls.push(MuxCall::ClearPaneDiedHook {
            name: name.to_string(),
        });
        let session = Self::resolve_session(&mut state, name)?;
        session.pane_died_hook = None;
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
