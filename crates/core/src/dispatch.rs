// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Pure dispatch planning.
//!
//! The dispatch cycle in the engine queries, executes, and commits; this
//! module only decides. Capacity, batch size, and readiness are combined
//! into a [`DispatchPlan`] with a deterministic limiting reason.

use crate::bead::BeadId;
use crate::sling::SlingContext;
use std::collections::HashSet;

/// A work item waiting to be dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingBead {
    /// The sling-context bead carrying the scheduling record.
    pub sling_id: BeadId,
    /// The underlying work bead.
    pub work_id: BeadId,
    /// Parsed context, when the description was readable.
    pub ctx: Option<SlingContext>,
}

/// What limited (or emptied) a dispatch plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanReason {
    /// Available capacity was the limiting factor.
    Capacity,
    /// Batch size was the limiting factor.
    Batch,
    /// Everything ready fit in the plan.
    Ready,
    /// Nothing was ready.
    None,
}

impl PlanReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanReason::Capacity => "capacity",
            PlanReason::Batch => "batch",
            PlanReason::Ready => "ready",
            PlanReason::None => "none",
        }
    }
}

/// The outcome of planning one dispatch cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchPlan {
    pub to_dispatch: Vec<PendingBead>,
    pub skipped: usize,
    pub reason: PlanReason,
}

/// Select which ready items to dispatch this cycle.
///
/// Takes `min(available, batch, ready.len())` in queue order. When limits
/// tie, the reported reason follows the precedence capacity < ready < batch.
pub fn plan_dispatch(available: i64, batch: usize, ready: Vec<PendingBead>) -> DispatchPlan {
    if ready.is_empty() {
        return DispatchPlan {
            to_dispatch: Vec::new(),
            skipped: 0,
            reason: PlanReason::None,
        };
    }

    if available <= 0 {
        let skipped = ready.len();
        return DispatchPlan {
            to_dispatch: Vec::new(),
            skipped,
            reason: PlanReason::Capacity,
        };
    }

    let available = available as usize;
    let batch = batch.max(1);
    let total = ready.len();
    let take = available.min(batch).min(total);

    let reason = if available < batch && available < total {
        PlanReason::Capacity
    } else if total < batch {
        PlanReason::Ready
    } else {
        PlanReason::Batch
    };

    let mut to_dispatch = ready;
    to_dispatch.truncate(take);
    DispatchPlan {
        to_dispatch,
        skipped: total - take,
        reason,
    }
}

/// Drop items whose sling context has tripped the circuit breaker.
///
/// Items with no parsed context pass through unchanged. Returns
/// `(kept, removed)`, both in input order.
pub fn filter_circuit_broken(
    items: Vec<PendingBead>,
    max_failures: u32,
) -> (Vec<PendingBead>, Vec<PendingBead>) {
    let mut kept = Vec::new();
    let mut removed = Vec::new();
    for item in items {
        let broken = item
            .ctx
            .as_ref()
            .is_some_and(|ctx| ctx.dispatch_failures >= max_failures);
        if broken {
            removed.push(item);
        } else {
            kept.push(item);
        }
    }
    (kept, removed)
}

/// Readiness filter that lets everything through.
pub fn all_ready(items: Vec<PendingBead>) -> Vec<PendingBead> {
    items
}

/// Readiness filter keeping only items whose work bead is in `ready_ids`.
///
/// Order-preserving.
pub fn blocker_aware(
    ready_ids: HashSet<String>,
) -> impl Fn(Vec<PendingBead>) -> Vec<PendingBead> {
    move |items| {
        items
            .into_iter()
            .filter(|item| ready_ids.contains(item.work_id.as_str()))
            .collect()
    }
}

/// What to do with an item whose dispatch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Quarantine on the first failure.
    NoRetry,
    /// Retry until the failure count reaches the threshold, then quarantine.
    CircuitBreaker { max_failures: u32 },
}

impl FailurePolicy {
    /// Whether an item with `failures` recorded failures should be quarantined
    /// rather than retried.
    pub fn should_quarantine(&self, failures: u32) -> bool {
        match self {
            FailurePolicy::NoRetry => failures >= 1,
            FailurePolicy::CircuitBreaker { max_failures } => failures >= *max_failures,
        }
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
