// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Sling-context CRUD on the tracker.

use super::DispatchError;
use dk_adapters::{BeadQuery, BeadUpdate, Tracker, TrackerError};
use dk_core::{BeadId, CloseReason, NewBead, PendingBead, ShortId, SlingContext, SLING_CONTEXT_LABEL};

/// Store for the scheduler's per-work-item records.
#[derive(Clone)]
pub struct SlingStore<T: Tracker> {
    tracker: T,
    actor: String,
}

impl<T: Tracker> SlingStore<T> {
    pub fn new(tracker: T, actor: impl Into<String>) -> Self {
        Self {
            tracker,
            actor: actor.into(),
        }
    }

    /// Create a sling context for a work bead.
    ///
    /// Idempotent on the work id: an existing open context is returned
    /// instead of a duplicate (at most one open context per work bead).
    /// The `tracks` dependency to the work bead is best-effort —
    /// cross-database dependencies may be unsupported.
    pub async fn create(&self, ctx: &SlingContext) -> Result<BeadId, DispatchError> {
        if let Some(existing) = self.find_open_by_work_id(&ctx.work_bead).await? {
            tracing::debug!(work = %ctx.work_bead, sling = %existing.sling_id, "sling context already open");
            return Ok(existing.sling_id);
        }

        let description = ctx
            .to_json()
            .map_err(|e| DispatchError::Tracker(TrackerError::Parse(e.to_string())))?;
        let bead = self
            .tracker
            .create(NewBead {
                title: format!("Sling {} -> {}", ctx.work_bead.short(12), ctx.rig),
                kind: "sling-context".to_string(),
                priority: 2,
                description,
                actor: self.actor.clone(),
                labels: vec![SLING_CONTEXT_LABEL.to_string()],
                ephemeral: true,
            })
            .await?;

        let work = BeadId::new(ctx.work_bead.clone());
        if let Err(err) = self.tracker.add_dependency(&work, &bead.id).await {
            tracing::warn!(work = %work, error = %err, "tracks dependency not recorded");
        }

        Ok(bead.id)
    }

    /// The open sling context for a work bead, if any.
    pub async fn find_open_by_work_id(
        &self,
        work_id: &str,
    ) -> Result<Option<PendingBead>, DispatchError> {
        let open = self.list_open().await?;
        Ok(open.into_iter().find(|p| p.work_id == *work_id))
    }

    /// All open sling contexts, in tracker order.
    ///
    /// Unparseable descriptions degrade to `ctx: None` rather than failing
    /// the listing.
    pub async fn list_open(&self) -> Result<Vec<PendingBead>, DispatchError> {
        let beads = self
            .tracker
            .list(BeadQuery::open_with_label(SLING_CONTEXT_LABEL))
            .await?;
        let mut pending = Vec::with_capacity(beads.len());
        for bead in beads {
            let ctx = match SlingContext::from_json(&bead.description) {
                Ok(ctx) => Some(ctx),
                Err(err) => {
                    tracing::warn!(sling = %bead.id, error = %err, "unreadable sling context");
                    None
                }
            };
            let work_id = ctx
                .as_ref()
                .map(|c| BeadId::new(c.work_bead.clone()))
                .unwrap_or_else(|| BeadId::new(""));
            pending.push(PendingBead {
                sling_id: bead.id,
                work_id,
                ctx,
            });
        }
        Ok(pending)
    }

    /// Close a sling context. Already-closed is success (idempotent).
    pub async fn close(&self, sling_id: &BeadId, reason: CloseReason) -> Result<(), DispatchError> {
        match self.tracker.close(sling_id, reason.as_str()).await {
            Ok(()) => Ok(()),
            Err(TrackerError::AlreadyClosed(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Re-serialize updated fields into the bead description.
    pub async fn update(
        &self,
        sling_id: &BeadId,
        ctx: &SlingContext,
    ) -> Result<(), DispatchError> {
        let description = ctx
            .to_json()
            .map_err(|e| DispatchError::Tracker(TrackerError::Parse(e.to_string())))?;
        self.tracker
            .update(
                sling_id,
                BeadUpdate {
                    description: Some(description),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "sling_store_tests.rs"]
mod tests;
