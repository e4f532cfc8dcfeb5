// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Mail adapter shelling out to the town mail router CLI.

use super::{MailAdapter, MailError};
use crate::subprocess::{run_with_timeout, MAIL_TIMEOUT};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;

/// CLI-backed mail router rooted in a town directory.
#[derive(Clone)]
pub struct CliMail {
    bin: String,
    town_root: PathBuf,
}

impl CliMail {
    pub fn new(town_root: impl Into<PathBuf>) -> Self {
        Self {
            bin: "tm".to_string(),
            town_root: town_root.into(),
        }
    }

    /// Override the router binary.
    pub fn with_binary(mut self, bin: impl Into<String>) -> Self {
        self.bin = bin.into();
        self
    }
}

#[async_trait]
impl MailAdapter for CliMail {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let mut cmd = Command::new(&self.bin);
        cmd.current_dir(&self.town_root);
        cmd.args(["send", to, "--subject", subject, "--body", body]);
        let output = run_with_timeout(cmd, MAIL_TIMEOUT, "mail send")
            .await
            .map_err(MailError::SendFailed)?;
        if !output.status.success() {
            return Err(MailError::SendFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(())
    }
}
