// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Mail router adapters for inter-agent notification.
//!
//! The router is an external collaborator; sends are best-effort and
//! callers log failures rather than propagate them.

mod cli;

pub use cli::CliMail;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeMail, MailCall};

use async_trait::async_trait;
use thiserror::Error;

/// Errors from mail operations
#[derive(Debug, Clone, Error)]
pub enum MailError {
    #[error("mail send failed: {0}")]
    SendFailed(String),
}

/// Adapter for the town mail router.
#[async_trait]
pub trait MailAdapter: Clone + Send + Sync + 'static {
    /// Send a message to an agent address (`rig/role` or `rig/polecats/name`).
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}
