// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O.
//!
//! Every external collaborator of the control plane — the terminal
//! multiplexer, the bead tracker, git, the process table, the mail router,
//! desktop notifications — sits behind an async trait here, with a real
//! shell-out implementation and a recording fake for tests.

pub mod git;
pub mod mail;
pub mod mux;
pub mod notify;
pub mod proc;
pub mod subprocess;
pub mod tracker;

pub use git::{CliGit, GitAdapter, GitError, SquashResult, SubmoduleChange};
pub use mail::{CliMail, MailAdapter, MailError};
pub use mux::{
    default_socket, set_default_socket, MuxAdapter, MuxError, PaneInfo, TmuxMux,
    UNCONFIGURED_SOCKET,
};
pub use notify::{DesktopNotifyAdapter, NotifyAdapter, NotifyError};
pub use proc::{ProcEntry, ProcError, ProcSnapshot, ProcessTable, PsProcessTable, TermSignal};
pub use tracker::{BdTracker, BeadQuery, BeadUpdate, MergeSlotStatus, Tracker, TrackerError};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use git::{FakeGit, GitCall};
#[cfg(any(test, feature = "test-support"))]
pub use mail::{FakeMail, MailCall};
#[cfg(any(test, feature = "test-support"))]
pub use mux::{FakeMux, FakePane, FakeSession, MuxCall};
#[cfg(any(test, feature = "test-support"))]
pub use notify::{FakeNotifyAdapter, NotifyCall};
#[cfg(any(test, feature = "test-support"))]
pub use proc::FakeProcessTable;
#[cfg(any(test, feature = "test-support"))]
pub use tracker::FakeTracker;
