// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! In-memory tracker for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{BeadQuery, BeadUpdate, MergeSlotStatus, Tracker, TrackerError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dk_core::{Bead, BeadId, BeadStatus, NewBead};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct SlotState {
    holder: Option<String>,
}

struct FakeTrackerState {
    beads: Vec<Bead>,
    /// blocked id -> blocker ids
    deps: HashMap<String, Vec<BeadId>>,
    slots: HashMap<String, SlotState>,
    next_id: u64,
    now: DateTime<Utc>,
    /// Close calls that fail before one succeeds.
    close_failures: u32,
    /// Update calls that fail before one succeeds.
    update_failures: u32,
    close_reasons: HashMap<String, String>,
}

/// In-memory tracker with a CAS merge slot.
#[derive(Clone)]
pub struct FakeTracker {
    inner: Arc<Mutex<FakeTrackerState>>,
}

impl Default for FakeTracker {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeTrackerState {
                beads: Vec::new(),
                deps: HashMap::new(),
                slots: HashMap::new(),
                next_id: 0,
                now: Utc::now(),
                close_failures: 0,
                update_failures: 0,
                close_reasons: HashMap::new(),
            })),
        }
    }
}

impl FakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the timestamp used for created_at/updated_at.
    pub fn set_now(&self, now: DateTime<Utc>) {
        self.inner.lock().now = now;
    }

    /// Insert a bead directly (bypassing `create`).
    pub fn insert(&self, bead: Bead) {
        self.inner.lock().beads.push(bead);
    }

    /// Fetch a bead without going through the trait.
    pub fn get(&self, id: &str) -> Option<Bead> {
        let mut state = self.inner.lock();
        Self::refresh_blocked_by(&mut state);
        state.beads.iter().find(|b| b.id == *id).cloned()
    }

    /// The recorded close reason for a bead, if closed via the trait.
    pub fn close_reason(&self, id: &str) -> Option<String> {
        self.inner.lock().close_reasons.get(id).cloned()
    }

    /// Current holder of a rig's slot.
    pub fn slot_holder(&self, rig: &str) -> Option<String> {
        self.inner
            .lock()
            .slots
            .get(rig)
            .and_then(|s| s.holder.clone())
    }

    /// Force the slot into a held state.
    pub fn set_slot_holder(&self, rig: &str, holder: Option<&str>) {
        self.inner.lock().slots.entry(rig.to_string()).or_default().holder =
            holder.map(|h| h.to_string());
    }

    /// Make the next `n` close calls fail.
    pub fn fail_next_closes(&self, n: u32) {
        self.inner.lock().close_failures = n;
    }

    /// Make the next `n` update calls fail.
    pub fn fail_next_updates(&self, n: u32) {
        self.inner.lock().update_failures = n;
    }

    fn refresh_blocked_by(state: &mut FakeTrackerState) {
        let open: HashMap<String, bool> = state
            .beads
            .iter()
            .map(|b| (b.id.as_str().to_string(), b.is_open()))
            .collect();
        let deps = state.deps.clone();
        for bead in &mut state.beads {
            let blockers = deps.get(bead.id.as_str()).cloned().unwrap_or_default();
            bead.blocked_by = blockers
                .into_iter()
                .filter(|blocker| open.get(blocker.as_str()).copied().unwrap_or(false))
                .collect();
        }
    }
}

#[async_trait]
impl Tracker for FakeTracker {
    async fn list(&self, query: BeadQuery) -> Result<Vec<Bead>, TrackerError> {
        let mut state = self.inner.lock();
        Self::refresh_blocked_by(&mut state);
        let mut out: Vec<Bead> = state
            .beads
            .iter()
            .filter(|b| query.status.map(|s| b.status == s).unwrap_or(true))
            .filter(|b| query.label.as_deref().map(|l| b.has_label(l)).unwrap_or(true))
            .filter(|b| query.priority.map(|p| b.priority == p).unwrap_or(true))
            .cloned()
            .collect();
        if let Some(limit) = query.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn show(&self, id: &BeadId) -> Result<Bead, TrackerError> {
        self.get(id.as_str())
            .ok_or_else(|| TrackerError::NotFound(id.to_string()))
    }

    async fn create(&self, new: NewBead) -> Result<Bead, TrackerError> {
        let mut state = self.inner.lock();
        state.next_id += 1;
        let now = state.now;
        let bead = Bead {
            id: BeadId::new(format!("bd-{}", state.next_id)),
            title: new.title,
            kind: new.kind,
            status: BeadStatus::Open,
            priority: new.priority,
            description: new.description,
            labels: new.labels,
            assignee: String::new(),
            created_at: now,
            updated_at: now,
            blocked_by: Vec::new(),
        };
        state.beads.push(bead.clone());
        Ok(bead)
    }

    async fn update(&self, id: &BeadId, update: BeadUpdate) -> Result<(), TrackerError> {
        let mut state = self.inner.lock();
        if state.update_failures > 0 {
            state.update_failures -= 1;
            return Err(TrackerError::CommandFailed("injected update failure".into()));
        }
        let now = state.now;
        let bead = state
            .beads
            .iter_mut()
            .find(|b| b.id == *id)
            .ok_or_else(|| TrackerError::NotFound(id.to_string()))?;
        if let Some(description) = update.description {
            bead.description = description;
        }
        if let Some(assignee) = update.assignee {
            bead.assignee = assignee;
        }
        if let Some(labels) = update.labels {
            bead.labels = labels;
        }
        bead.updated_at = now;
        Ok(())
    }

    async fn close(&self, id: &BeadId, reason: &str) -> Result<(), TrackerError> {
        let mut state = self.inner.lock();
        if state.close_failures > 0 {
            state.close_failures -= 1;
            return Err(TrackerError::CommandFailed("injected close failure".into()));
        }
        let now = state.now;
        let bead = state
            .beads
            .iter_mut()
            .find(|b| b.id == *id)
            .ok_or_else(|| TrackerError::NotFound(id.to_string()))?;
        if bead.status == BeadStatus::Closed {
            return Err(TrackerError::AlreadyClosed(id.to_string()));
        }
        bead.status = BeadStatus::Closed;
        bead.updated_at = now;
        let key = id.as_str().to_string();
        state.close_reasons.insert(key, reason.to_string());
        Ok(())
    }

    async fn add_dependency(
        &self,
        blocker: &BeadId,
        blocked: &BeadId,
    ) -> Result<(), TrackerError> {
        let mut state = self.inner.lock();
        state
            .deps
            .entry(blocked.as_str().to_string())
            .or_default()
            .push(blocker.clone());
        Ok(())
    }

    async fn merge_slot_ensure(&self, rig: &str) -> Result<BeadId, TrackerError> {
        let mut state = self.inner.lock();
        state.slots.entry(rig.to_string()).or_default();
        Ok(BeadId::new(format!("slot-{}", rig)))
    }

    async fn merge_slot_acquire(
        &self,
        rig: &str,
        holder: &str,
        _add_waiter: bool,
    ) -> Result<MergeSlotStatus, TrackerError> {
        let mut state = self.inner.lock();
        let slot = state.slots.entry(rig.to_string()).or_default();
        match &slot.holder {
            None => {
                slot.holder = Some(holder.to_string());
                Ok(MergeSlotStatus {
                    available: false,
                    holder: slot.holder.clone(),
                })
            }
            Some(current) => Ok(MergeSlotStatus {
                available: false,
                holder: Some(current.clone()),
            }),
        }
    }

    async fn merge_slot_release(&self, rig: &str, holder: &str) -> Result<(), TrackerError> {
        let mut state = self.inner.lock();
        if let Some(slot) = state.slots.get_mut(rig) {
            if slot.holder.as_deref() == Some(holder) {
                slot.holder = None;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
