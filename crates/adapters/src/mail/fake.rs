// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Fake mail adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{MailAdapter, MailError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// Recorded mail send
#[derive(Debug, Clone, PartialEq)]
pub struct MailCall {
    pub to: String,
    pub subject: String,
    pub body: String,
}

struct FakeMailState {
    calls: Vec<MailCall>,
    fail: bool,
}

/// Fake mail adapter for testing
#[derive(Clone)]
pub struct FakeMail {
    inner: Arc<Mutex<FakeMailState>>,
}

impl Default for FakeMail {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeMailState {
                calls: Vec::new(),
                fail: false,
            })),
        }
    }
}

impl FakeMail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded sends
    pub fn calls(&self) -> Vec<MailCall> {
        self.inner.lock().calls.clone()
    }

    /// Make every send fail (to exercise best-effort paths).
    pub fn fail_sends(&self, fail: bool) {
        self.inner.lock().fail = fail;
    }
}

#[async_trait]
impl MailAdapter for FakeMail {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let mut state = self.inner.lock();
        if state.fail {
            return Err(MailError::SendFailed("router unavailable".to_string()));
        }
        state.calls.push(MailCall {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
