// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Merge-slot protocol: a cross-process mutex over the tracker.
//!
//! Serializes pushes to a rig's default branch across engineers, even on
//! different hosts observing the same rig. Acquisition is advisory —
//! callers inspect the returned status rather than trusting errors.

use dk_adapters::{MergeSlotStatus, Tracker, TrackerError};
use dk_core::{BeadId, Clock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SLOT_RETRIES: u32 = 10;
const SLOT_BACKOFF_START: Duration = Duration::from_millis(500);
const SLOT_BACKOFF_CAP: Duration = Duration::from_secs(10);

/// Outcome of trying to take the slot for a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotAcquireOutcome {
    /// The caller holds the slot under this holder string.
    Acquired { holder: String },
    /// The slot is held by this rig's own conflict-resolution path; the
    /// single-threaded engineer already owns it, proceed without acquiring.
    HeldForConflictResolution,
    /// Retries exhausted. Transient; the merge retries next poll cycle.
    TimedOut,
}

/// Handle on one rig's merge slot.
#[derive(Clone)]
pub struct MergeSlot<T: Tracker> {
    tracker: T,
    rig: String,
    /// Disambiguates holders created within one wall-clock tick.
    counter: Arc<AtomicU64>,
}

impl<T: Tracker> MergeSlot<T> {
    pub fn new(tracker: T, rig: impl Into<String>) -> Self {
        Self {
            tracker,
            rig: rig.into(),
            counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The canonical slot id, creating the record if necessary.
    pub async fn ensure_exists(&self) -> Result<BeadId, TrackerError> {
        self.tracker.merge_slot_ensure(&self.rig).await
    }

    /// Holder string used by the conflict-resolution path.
    pub fn conflict_holder(&self) -> String {
        format!("{}/refinery", self.rig)
    }

    fn push_holder<C: Clock>(&self, clock: &C) -> String {
        let nanos = clock
            .now()
            .timestamp_nanos_opt()
            .unwrap_or_else(|| clock.epoch_ms());
        let seq = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}/refinery/push/{}-{}", self.rig, nanos, seq)
    }

    /// Raw advisory acquire.
    pub async fn acquire(
        &self,
        holder: &str,
        add_waiter: bool,
    ) -> Result<MergeSlotStatus, TrackerError> {
        self.tracker
            .merge_slot_acquire(&self.rig, holder, add_waiter)
            .await
    }

    /// Idempotent release.
    pub async fn release(&self, holder: &str) -> Result<(), TrackerError> {
        self.tracker.merge_slot_release(&self.rig, holder).await
    }

    /// Take the slot for a default-branch push, with capped backoff.
    pub async fn acquire_for_push<C: Clock>(
        &self,
        clock: &C,
    ) -> Result<SlotAcquireOutcome, TrackerError> {
        let holder = self.push_holder(clock);
        let conflict_holder = self.conflict_holder();
        let mut backoff = SLOT_BACKOFF_START;

        for attempt in 0..SLOT_RETRIES {
            let status = self.acquire(&holder, attempt == 0).await?;
            if status.held_by(&holder) {
                return Ok(SlotAcquireOutcome::Acquired { holder });
            }
            if status.holder.as_deref() == Some(conflict_holder.as_str()) {
                return Ok(SlotAcquireOutcome::HeldForConflictResolution);
            }
            if attempt + 1 < SLOT_RETRIES {
                tracing::debug!(
                    rig = %self.rig,
                    holder = ?status.holder,
                    attempt = attempt + 1,
                    "merge slot busy, backing off"
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(SLOT_BACKOFF_CAP);
            }
        }
        Ok(SlotAcquireOutcome::TimedOut)
    }

    /// Best-effort acquire under the conflict-resolution holder.
    ///
    /// True when this rig's engineer now (or already) owns the slot.
    pub async fn try_acquire_for_conflict(&self) -> Result<bool, TrackerError> {
        let holder = self.conflict_holder();
        let status = self.acquire(&holder, false).await?;
        Ok(status.held_by(&holder))
    }
}

#[cfg(test)]
#[path = "slot_tests.rs"]
mod tests;
