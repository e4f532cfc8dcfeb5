// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dk-core: Core data model for the Derrick town control plane.
//!
//! Everything in this crate is pure: records, parsers, and planning logic
//! with no I/O. The engine crates execute what this crate computes.

pub mod alarm;
pub mod bead;
pub mod clock;
pub mod dispatch;
pub mod id;
pub mod merge;
pub mod schedule;
pub mod scheduler;
pub mod session;
pub mod sling;
pub mod time_fmt;

pub use alarm::{Alarm, AlarmId};
pub use bead::{Bead, BeadId, BeadStatus, NewBead};
pub use clock::{Clock, SystemClock};
pub use dispatch::{
    all_ready, blocker_aware, filter_circuit_broken, plan_dispatch, DispatchPlan, FailurePolicy,
    PendingBead, PlanReason,
};
pub use id::{short_token, IdGen, SequentialIdGen, ShortId, UuidIdGen};
pub use merge::{
    AnomalyKind, ConflictPolicy, GateDef, GateResult, MergeOutcome, MrInfo, QueueAnomaly,
    RefineryConfig,
};
pub use schedule::{
    next_snapped_time, parse_extended_duration, parse_schedule, ParsedSchedule, ScheduleError,
    SnapUnit,
};
pub use scheduler::{SchedulerConfig, SchedulerState};
pub use session::{validate_session_name, SessionHealth, AGENT_PROCS_ENV, AGENT_PROCS_ENV_LEGACY};
pub use sling::{CloseReason, SlingContext, SLING_CONTEXT_LABEL};
pub use time_fmt::{format_countdown, format_elapsed};

#[cfg(any(test, feature = "test-support"))]
pub use clock::FakeClock;
