// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dk-engine: the control-plane runtime.
//!
//! Four subsystems over the adapter traits:
//!
//! - [`supervisor`] — session lifecycle, health, input injection, termination
//! - [`dispatch`] — capacity-controlled dispatch cycle and sling-context store
//! - [`refinery`] — the per-rig merge queue with gates and the merge slot
//! - [`alarm`] — the reminder fire loop

pub mod alarm;
pub mod dispatch;
pub mod refinery;
pub mod supervisor;

pub use alarm::{AlarmEngine, FireReport};
pub use dispatch::{
    CycleConfig, CycleReport, DispatchCycle, DispatchError, DispatchHooks, SlingStore,
};
pub use refinery::{
    Engineer, GateRunner, MergeSlot, RefineryError, ShellGateRunner, SlotAcquireOutcome,
};
pub use supervisor::{EnsureOutcome, Supervisor, SupervisorConfig, SupervisorError};

#[cfg(any(test, feature = "test-support"))]
pub use refinery::FakeGateRunner;
