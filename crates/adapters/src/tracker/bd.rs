// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Tracker adapter shelling out to the `bd` CLI with `--json` output.

use super::{BeadQuery, BeadUpdate, MergeSlotStatus, Tracker, TrackerError};
use crate::subprocess::{run_with_timeout, TRACKER_TIMEOUT};
use async_trait::async_trait;
use dk_core::{Bead, BeadId, NewBead};
use serde::Deserialize;
use std::path::PathBuf;
use tokio::process::Command;

/// CLI-backed tracker rooted in a town directory.
#[derive(Clone)]
pub struct BdTracker {
    bin: String,
    town_root: PathBuf,
}

impl BdTracker {
    pub fn new(town_root: impl Into<PathBuf>) -> Self {
        Self {
            bin: "bd".to_string(),
            town_root: town_root.into(),
        }
    }

    /// Override the tracker binary (tests, alternate installs).
    pub fn with_binary(mut self, bin: impl Into<String>) -> Self {
        self.bin = bin.into();
        self
    }

    async fn run(&self, args: &[&str], desc: &str) -> Result<Vec<u8>, TrackerError> {
        let mut cmd = Command::new(&self.bin);
        cmd.current_dir(&self.town_root);
        cmd.args(args);
        let output = run_with_timeout(cmd, TRACKER_TIMEOUT, desc)
            .await
            .map_err(TrackerError::CommandFailed)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let line = stderr.trim();
            if line.contains("not found") || line.contains("no such bead") {
                return Err(TrackerError::NotFound(line.to_string()));
            }
            if line.contains("already closed") {
                return Err(TrackerError::AlreadyClosed(line.to_string()));
            }
            return Err(TrackerError::CommandFailed(line.to_string()));
        }
        Ok(output.stdout)
    }

    fn parse<T: for<'de> Deserialize<'de>>(&self, bytes: &[u8]) -> Result<T, TrackerError> {
        serde_json::from_slice(bytes).map_err(|e| TrackerError::Parse(e.to_string()))
    }
}

#[derive(Deserialize)]
struct SlotRecord {
    id: BeadId,
    available: bool,
    #[serde(default)]
    holder: Option<String>,
}

#[async_trait]
impl Tracker for BdTracker {
    async fn list(&self, query: BeadQuery) -> Result<Vec<Bead>, TrackerError> {
        let mut args: Vec<String> = vec!["list".into(), "--json".into()];
        if let Some(status) = query.status {
            args.push("--status".into());
            args.push(status.as_str().into());
        }
        if let Some(label) = &query.label {
            args.push("--label".into());
            args.push(label.clone());
        }
        if let Some(priority) = query.priority {
            args.push("--priority".into());
            args.push(priority.to_string());
        }
        if let Some(limit) = query.limit {
            args.push("--limit".into());
            args.push(limit.to_string());
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let stdout = self.run(&args, "bd list").await?;
        self.parse(&stdout)
    }

    async fn show(&self, id: &BeadId) -> Result<Bead, TrackerError> {
        let stdout = self.run(&["show", id.as_str(), "--json"], "bd show").await?;
        self.parse(&stdout)
    }

    async fn create(&self, new: NewBead) -> Result<Bead, TrackerError> {
        let priority = new.priority.to_string();
        let mut args: Vec<&str> = vec![
            "create",
            "--json",
            "--title",
            &new.title,
            "--type",
            &new.kind,
            "--priority",
            &priority,
            "--description",
            &new.description,
            "--actor",
            &new.actor,
        ];
        for label in &new.labels {
            args.push("--label");
            args.push(label);
        }
        if new.ephemeral {
            args.push("--ephemeral");
        }
        let stdout = self.run(&args, "bd create").await?;
        self.parse(&stdout)
    }

    async fn update(&self, id: &BeadId, update: BeadUpdate) -> Result<(), TrackerError> {
        let mut args: Vec<&str> = vec!["update", id.as_str()];
        if let Some(description) = &update.description {
            args.push("--description");
            args.push(description);
        }
        if let Some(assignee) = &update.assignee {
            args.push("--assignee");
            args.push(assignee);
        }
        if let Some(labels) = &update.labels {
            for label in labels {
                args.push("--label");
                args.push(label);
            }
            if labels.is_empty() {
                args.push("--clear-labels");
            }
        }
        self.run(&args, "bd update").await?;
        Ok(())
    }

    async fn close(&self, id: &BeadId, reason: &str) -> Result<(), TrackerError> {
        self.run(&["close", id.as_str(), "--reason", reason], "bd close")
            .await?;
        Ok(())
    }

    async fn add_dependency(
        &self,
        blocker: &BeadId,
        blocked: &BeadId,
    ) -> Result<(), TrackerError> {
        self.run(
            &["dep", "add", blocker.as_str(), blocked.as_str()],
            "bd dep add",
        )
        .await?;
        Ok(())
    }

    async fn merge_slot_ensure(&self, rig: &str) -> Result<BeadId, TrackerError> {
        let stdout = self
            .run(&["slot", "ensure", "--rig", rig, "--json"], "bd slot ensure")
            .await?;
        let record: SlotRecord = self.parse(&stdout)?;
        Ok(record.id)
    }

    async fn merge_slot_acquire(
        &self,
        rig: &str,
        holder: &str,
        add_waiter: bool,
    ) -> Result<MergeSlotStatus, TrackerError> {
        let mut args: Vec<&str> = vec![
            "slot", "acquire", "--rig", rig, "--holder", holder, "--json",
        ];
        if add_waiter {
            args.push("--wait");
        }
        let stdout = self.run(&args, "bd slot acquire").await?;
        let record: SlotRecord = self.parse(&stdout)?;
        Ok(MergeSlotStatus {
            available: record.available,
            holder: record.holder,
        })
    }

    async fn merge_slot_release(&self, rig: &str, holder: &str) -> Result<(), TrackerError> {
        self.run(
            &["slot", "release", "--rig", rig, "--holder", holder],
            "bd slot release",
        )
        .await?;
        Ok(())
    }
}
