// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Operator-facing desktop notifications.
//!
//! The control plane raises these for events that need a human even when
//! nobody is watching the logs: quarantined work items, escalated merge
//! conflicts. Callers treat sends as best-effort.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from notify operations
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification not delivered: {0}")]
    SendFailed(String),
}

/// Adapter for operator-facing notifications
#[async_trait]
pub trait NotifyAdapter: Clone + Send + Sync + 'static {
    /// Send a notification with a title and message body
    async fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError>;
}

/// Desktop notifications through the platform notification center.
#[derive(Clone, Copy, Debug, Default)]
pub struct DesktopNotifyAdapter;

impl DesktopNotifyAdapter {
    pub fn new() -> Self {
        // mac-notification-sys resolves a bundle identifier via AppleScript
        // on first use, which hangs forever in a daemon without Automation
        // permissions. Pinning one up front skips that lookup.
        #[cfg(target_os = "macos")]
        let _ = mac_notification_sys::set_application("com.apple.Terminal");
        Self
    }
}

#[async_trait]
impl NotifyAdapter for DesktopNotifyAdapter {
    async fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        let title = title.to_string();
        let message = message.to_string();
        // Notification::show blocks (synchronously talks to the
        // notification service), so it runs on the blocking pool; the
        // outcome is awaited and reported rather than fire-and-forgotten,
        // letting callers log delivery failures.
        let delivery = tokio::task::spawn_blocking(move || {
            notify_rust::Notification::new()
                .appname("derrick")
                .summary(&title)
                .body(&message)
                .show()
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .await;
        match delivery {
            Ok(Ok(())) => Ok(()),
            Ok(Err(show_err)) => Err(NotifyError::SendFailed(show_err)),
            Err(join_err) => Err(NotifyError::SendFailed(join_err.to_string())),
        }
    }
}

/// Fake notification adapter for testing
#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
pub mod fake {
    use super::{NotifyAdapter, NotifyError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Recorded notification
    #[derive(Debug, Clone, PartialEq)]
    pub struct NotifyCall {
        pub title: String,
        pub message: String,
    }

    /// Fake notification adapter recording every send.
    #[derive(Clone, Default)]
    pub struct FakeNotifyAdapter {
        calls: Arc<Mutex<Vec<NotifyCall>>>,
        fail: Arc<Mutex<bool>>,
    }

    impl FakeNotifyAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        /// Get all recorded notifications
        pub fn calls(&self) -> Vec<NotifyCall> {
            self.calls.lock().clone()
        }

        /// Make every send fail (to exercise best-effort call sites).
        pub fn fail_sends(&self, fail: bool) {
            *self.fail.lock() = fail;
        }
    }

    #[async_trait]
    impl NotifyAdapter for FakeNotifyAdapter {
        async fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError> {
            if *self.fail.lock() {
                return Err(NotifyError::SendFailed("notification center down".into()));
            }
            self.calls.lock().push(NotifyCall {
                title: title.to_string(),
                message: message.to_string(),
            });
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeNotifyAdapter, NotifyCall};

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
