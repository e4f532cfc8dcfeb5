// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dk-storage: filesystem persistence for the control plane.
//!
//! State that does not belong on the tracker lives here: alarms (one JSON
//! file each) and the scheduler's operator-control record. Everything else
//! is re-derived from the tracker and the multiplexer on boot.

pub mod alarms;
pub mod runtime_dir;
pub mod scheduler_state;

pub use alarms::AlarmStore;
pub use runtime_dir::RuntimeDir;
pub use scheduler_state::SchedulerStateStore;

use thiserror::Error;

/// Errors from filesystem stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt record {path}: {message}")]
    Corrupt { path: String, message: String },
}
