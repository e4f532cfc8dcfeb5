// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Bead tracker adapters.
//!
//! The tracker is an external collaborator treated as an opaque
//! key/value+labels store. The control plane needs only the operations in
//! [`Tracker`]: list/show/create/update/close, one dependency edge, and the
//! merge-slot compare-and-set.

mod bd;

pub use bd::BdTracker;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeTracker;

use async_trait::async_trait;
use dk_core::{Bead, BeadId, BeadStatus, NewBead};
use thiserror::Error;

/// Errors from tracker operations
#[derive(Debug, Clone, Error)]
pub enum TrackerError {
    #[error("bead not found: {0}")]
    NotFound(String),
    #[error("bead already closed: {0}")]
    AlreadyClosed(String),
    #[error("tracker command failed: {0}")]
    CommandFailed(String),
    #[error("tracker output unreadable: {0}")]
    Parse(String),
}

/// Filters for listing beads.
#[derive(Debug, Clone, Default)]
pub struct BeadQuery {
    pub status: Option<BeadStatus>,
    pub label: Option<String>,
    pub priority: Option<i64>,
    pub limit: Option<usize>,
}

impl BeadQuery {
    pub fn open_with_label(label: impl Into<String>) -> Self {
        Self {
            status: Some(BeadStatus::Open),
            label: Some(label.into()),
            priority: None,
            limit: None,
        }
    }
}

/// Partial update of a bead. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct BeadUpdate {
    pub description: Option<String>,
    /// `Some("")` clears the assignee.
    pub assignee: Option<String>,
    /// Full replacement of the label set.
    pub labels: Option<Vec<String>>,
}

/// Post-call state of the merge slot.
///
/// Acquisition is advisory: a `holder` equal to the caller's own string
/// means the acquire succeeded; anything else means someone got there first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSlotStatus {
    pub available: bool,
    pub holder: Option<String>,
}

impl MergeSlotStatus {
    /// Whether `caller` owns the slot after the call.
    pub fn held_by(&self, caller: &str) -> bool {
        self.holder.as_deref() == Some(caller)
    }
}

/// Adapter for the bead store.
#[async_trait]
pub trait Tracker: Clone + Send + Sync + 'static {
    async fn list(&self, query: BeadQuery) -> Result<Vec<Bead>, TrackerError>;

    async fn show(&self, id: &BeadId) -> Result<Bead, TrackerError>;

    async fn create(&self, new: NewBead) -> Result<Bead, TrackerError>;

    async fn update(&self, id: &BeadId, update: BeadUpdate) -> Result<(), TrackerError>;

    async fn close(&self, id: &BeadId, reason: &str) -> Result<(), TrackerError>;

    /// Add a dependency edge: `blocked` waits on `blocker`.
    async fn add_dependency(&self, blocker: &BeadId, blocked: &BeadId)
        -> Result<(), TrackerError>;

    /// Ensure the rig's merge-slot record exists; returns its id.
    async fn merge_slot_ensure(&self, rig: &str) -> Result<BeadId, TrackerError>;

    /// Try to take the merge slot. Compare-and-set; inspect the returned
    /// status rather than relying on an error.
    async fn merge_slot_acquire(
        &self,
        rig: &str,
        holder: &str,
        add_waiter: bool,
    ) -> Result<MergeSlotStatus, TrackerError>;

    /// Release the merge slot. Idempotent; releasing a slot held by someone
    /// else is a no-op.
    async fn merge_slot_release(&self, rig: &str, holder: &str) -> Result<(), TrackerError>;
}
