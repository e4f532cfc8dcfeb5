// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! The refinery: a per-rig merge queue.
//!
//! One engineer runs per rig. Each poll cycle it claims ready merge
//! requests in priority order, pushes them through quality gates and a
//! squash merge, serializes default-branch pushes through the merge slot,
//! and escalates conflicts as resolution tasks that block the MR.

mod anomaly;
mod gates;
mod ready;
mod slot;

pub use gates::{run_gates, GateRunner, ShellGateRunner};
pub use ready::{ACTIVE_MR_LABEL_PREFIX, MERGE_OPT_OUT_LABEL, MERGE_REQUEST_LABEL};
pub use slot::{MergeSlot, SlotAcquireOutcome};

#[cfg(any(test, feature = "test-support"))]
pub use gates::FakeGateRunner;

use dk_adapters::{
    BeadUpdate, GitAdapter, GitError, MailAdapter, Tracker, TrackerError,
};
use dk_core::{
    BeadId, Clock, MergeOutcome, MrInfo, NewBead, RefineryConfig, ShortId,
};
use ready::MrFields;
use serde::Serialize;
use thiserror::Error;

/// Label on conflict-resolution tasks.
pub const CONFLICT_TASK_LABEL: &str = "refinery:conflict-resolution";

/// Label prefix on convoy beads naming notification subscribers.
const SUBSCRIBER_LABEL_PREFIX: &str = "subscriber:";

/// Errors from the refinery
#[derive(Debug, Error)]
pub enum RefineryError {
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error(transparent)]
    Git(#[from] GitError),
    #[error("source branch missing locally: {0}")]
    MissingBranch(String),
    #[error("merge request unreadable: {0}")]
    BadMr(String),
}

/// The per-rig merge queue engineer.
pub struct Engineer<T, G, R, M, C>
where
    T: Tracker,
    G: GitAdapter,
    R: GateRunner,
    M: MailAdapter,
    C: Clock,
{
    rig: String,
    default_branch: String,
    /// Claim-holder identity, also the conflict slot holder: `{rig}/refinery`.
    actor: String,
    config: RefineryConfig,
    tracker: T,
    git: G,
    gates: R,
    mail: M,
    clock: C,
    slot: MergeSlot<T>,
}

impl<T, G, R, M, C> Engineer<T, G, R, M, C>
where
    T: Tracker,
    G: GitAdapter,
    R: GateRunner,
    M: MailAdapter,
    C: Clock,
{
    pub fn new(
        rig: impl Into<String>,
        default_branch: impl Into<String>,
        config: RefineryConfig,
        tracker: T,
        git: G,
        gates: R,
        mail: M,
        clock: C,
    ) -> Self {
        let rig = rig.into();
        let slot = MergeSlot::new(tracker.clone(), rig.clone());
        let actor = format!("{}/refinery", rig);
        Self {
            rig,
            default_branch: default_branch.into(),
            actor,
            config,
            tracker,
            git,
            gates,
            mail,
            clock,
            slot,
        }
    }

    pub fn rig(&self) -> &str {
        &self.rig
    }

    pub fn slot(&self) -> &MergeSlot<T> {
        &self.slot
    }

    /// One poll cycle: claim and process every ready MR in priority order.
    ///
    /// A conflict blocks only its own MR (non-blocking delegation); the
    /// queue continues with the next one.
    pub async fn run_once(&self) -> Result<Vec<(BeadId, MergeOutcome)>, RefineryError> {
        if !self.config.enabled {
            return Ok(Vec::new());
        }
        self.slot.ensure_exists().await?;

        let mut outcomes = Vec::new();
        for mr in self.ready_mrs().await? {
            if let Err(err) = self.claim(&mr).await {
                tracing::warn!(mr = %mr.id, error = %err, "claim failed, skipping");
                continue;
            }
            let outcome = match self.process(&mr).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!(mr = %mr.id, error = %err, "merge attempt errored");
                    self.unclaim(&mr).await;
                    continue;
                }
            };
            self.handle_outcome(&mr, &outcome).await?;
            outcomes.push((mr.id.clone(), outcome));
        }
        Ok(outcomes)
    }

    async fn claim(&self, mr: &MrInfo) -> Result<(), TrackerError> {
        self.tracker
            .update(
                &mr.id,
                BeadUpdate {
                    assignee: Some(self.actor.clone()),
                    ..Default::default()
                },
            )
            .await
    }

    async fn unclaim(&self, mr: &MrInfo) {
        let result = self
            .tracker
            .update(
                &mr.id,
                BeadUpdate {
                    assignee: Some(String::new()),
                    ..Default::default()
                },
            )
            .await;
        if let Err(err) = result {
            tracing::warn!(mr = %mr.id, error = %err, "unclaim failed");
        }
    }

    /// The merge pipeline for one MR.
    pub async fn process(&self, mr: &MrInfo) -> Result<MergeOutcome, RefineryError> {
        // 1. Source must exist locally; conflicts are probed before any
        //    worktree mutation.
        if !self.git.branch_exists_local(&mr.branch).await? {
            return Err(RefineryError::MissingBranch(mr.branch.clone()));
        }
        self.git.checkout(&mr.target_branch).await?;
        if let Err(err) = self.git.pull(&mr.target_branch).await {
            tracing::warn!(target = %mr.target_branch, error = %err, "pull failed, merging against local state");
        }
        if self
            .git
            .merge_would_conflict(&mr.branch, &mr.target_branch)
            .await?
        {
            return Ok(MergeOutcome::Conflict {
                details: format!("{} does not merge cleanly into {}", mr.branch, mr.target_branch),
            });
        }

        // 2. Submodule commits must land on origin before the parent
        //    pointer does; the refinery owns all remote writes.
        let submodules = self
            .git
            .submodule_pointer_changes(&mr.branch, &mr.target_branch)
            .await?;
        if !submodules.is_empty() {
            self.git.ensure_submodules_initialized().await?;
            for change in &submodules {
                tracing::info!(path = %change.path, sha = %change.sha.short(12), "pushing submodule commit");
                self.git.push_submodule(&change.path).await?;
            }
        }

        // 3. Gates.
        let gate_defs = self.config.effective_gates();
        if !gate_defs.is_empty() {
            let results =
                gates::run_gates(&self.gates, &gate_defs, self.config.parallel_gates).await;
            if let Some(failure) = results.iter().find(|r| !r.success) {
                return Ok(MergeOutcome::TestsFailed {
                    gate: failure.name.clone(),
                    stderr: failure.error.clone(),
                });
            }
        }

        // 4. Squash merge, committed under the source head's message so
        //    conventional-commit prefixes survive.
        let squash = self.git.squash_merge(&mr.branch).await?;
        if !squash.is_clean() {
            self.git.abort_merge().await?;
            return Ok(MergeOutcome::Conflict {
                details: format!("conflicts in: {}", squash.conflicts.join(", ")),
            });
        }
        let message = self.git.head_message(&mr.branch).await?;
        let sha = self.git.commit(&message).await?;

        // 5. Default-branch pushes serialize through the merge slot.
        let held = if mr.target_branch == self.default_branch {
            match self.slot.acquire_for_push(&self.clock).await? {
                SlotAcquireOutcome::Acquired { holder } => Some(holder),
                SlotAcquireOutcome::HeldForConflictResolution => None,
                SlotAcquireOutcome::TimedOut => {
                    // Drop the local squash commit so the retry starts clean.
                    self.git
                        .reset_hard(&format!("origin/{}", mr.target_branch))
                        .await?;
                    return Ok(MergeOutcome::SlotTimeout);
                }
            }
        } else {
            None
        };

        // 6. Push; a rejected push must not leave the stale squash commit
        //    around to re-enter the next retry.
        if let Err(push_err) = self.git.push(&mr.target_branch).await {
            self.git
                .reset_hard(&format!("origin/{}", mr.target_branch))
                .await?;
            if let Some(holder) = held {
                let _ = self.slot.release(&holder).await;
            }
            return Ok(MergeOutcome::PushFailed {
                error: push_err.to_string(),
            });
        }
        if let Some(holder) = held {
            self.slot.release(&holder).await?;
        }

        // 7. Bookkeeping.
        self.finish_merged(mr, &sha).await?;
        Ok(MergeOutcome::Merged { sha })
    }

    /// Post-merge bookkeeping: close records, clean branches, settle
    /// convoys. Record updates are mandatory; branch cleanup, convoy
    /// settlement, pruning, and crew sync are individually best-effort.
    async fn finish_merged(&self, mr: &MrInfo, sha: &str) -> Result<(), RefineryError> {
        let description = to_json_description(&MrFields::from_info(mr, Some(sha.to_string())));
        self.tracker
            .update(
                &mr.id,
                BeadUpdate {
                    description,
                    ..Default::default()
                },
            )
            .await?;
        match self.tracker.close(&mr.id, "merged").await {
            Ok(()) | Err(TrackerError::AlreadyClosed(_)) => {}
            Err(err) => return Err(err.into()),
        }

        if let Some(agent_bead) = &mr.parent_agent_bead {
            self.clear_active_mr(agent_bead, &mr.id).await;
        }

        if let Some(issue) = &mr.source_issue {
            let reason = format!("merged via {}", mr.id);
            match self.tracker.close(issue, &reason).await {
                Ok(()) => {}
                Err(TrackerError::AlreadyClosed(_)) | Err(TrackerError::NotFound(_)) => {}
                Err(err) => {
                    tracing::warn!(issue = %issue, error = %err, "source issue close failed");
                }
            }
        }

        if self.config.delete_merged_branches {
            if let Err(err) = self.git.delete_branch_local(&mr.branch).await {
                tracing::warn!(branch = %mr.branch, error = %err, "local branch delete failed");
            }
            if mr.branch_exists_remote {
                if let Err(err) = self.git.delete_branch_remote(&mr.branch).await {
                    tracing::warn!(branch = %mr.branch, error = %err, "remote branch delete failed");
                }
            }
        }

        if let Some(convoy_id) = &mr.convoy_id {
            self.check_convoy_completion(convoy_id).await;
        }

        if let Err(err) = self.git.prune_remote().await {
            tracing::warn!(error = %err, "remote prune failed");
        }
        self.sync_crews().await;
        Ok(())
    }

    /// Remove the agent bead's `active-mr:` label for this MR.
    async fn clear_active_mr(&self, agent_bead: &BeadId, mr_id: &BeadId) {
        let label = format!("{}{}", ACTIVE_MR_LABEL_PREFIX, mr_id);
        let bead = match self.tracker.show(agent_bead).await {
            Ok(bead) => bead,
            Err(err) => {
                tracing::warn!(agent = %agent_bead, error = %err, "agent bead unavailable");
                return;
            }
        };
        if !bead.has_label(&label) {
            return;
        }
        let labels: Vec<String> = bead.labels.into_iter().filter(|l| *l != label).collect();
        let result = self
            .tracker
            .update(
                agent_bead,
                BeadUpdate {
                    labels: Some(labels),
                    ..Default::default()
                },
            )
            .await;
        if let Err(err) = result {
            tracing::warn!(agent = %agent_bead, error = %err, "active-mr clear failed");
        }
    }

    /// Close a convoy whose tracked issues are all closed; notify
    /// subscribers. Entirely best-effort.
    async fn check_convoy_completion(&self, convoy_id: &str) {
        let id = BeadId::new(convoy_id);
        let convoy = match self.tracker.show(&id).await {
            Ok(bead) => bead,
            Err(err) => {
                tracing::debug!(convoy = convoy_id, error = %err, "convoy not visible");
                return;
            }
        };
        if !convoy.is_open() || !convoy.blocked_by.is_empty() {
            return;
        }
        match self.tracker.close(&id, "all tracked issues closed").await {
            Ok(()) => {
                tracing::info!(convoy = convoy_id, "convoy complete");
                for label in &convoy.labels {
                    if let Some(subscriber) = label.strip_prefix(SUBSCRIBER_LABEL_PREFIX) {
                        let body = format!("Convoy {} is complete.", convoy.title);
                        if let Err(err) =
                            self.mail.send(subscriber, "convoy complete", &body).await
                        {
                            tracing::warn!(to = subscriber, error = %err, "convoy notify failed");
                        }
                    }
                }
            }
            Err(TrackerError::AlreadyClosed(_)) => {}
            Err(err) => {
                tracing::warn!(convoy = convoy_id, error = %err, "convoy close failed");
            }
        }
    }

    async fn sync_crews(&self) {
        let Some(command) = &self.config.crew_sync_command else {
            return;
        };
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(command);
        match cmd.output().await {
            Ok(output) if output.status.success() => {}
            Ok(output) => {
                tracing::warn!(
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "crew sync failed"
                );
            }
            Err(err) => {
                tracing::warn!(error = %err, "crew sync did not run");
            }
        }
    }

    /// Apply the queue-level consequences of an outcome.
    async fn handle_outcome(
        &self,
        mr: &MrInfo,
        outcome: &MergeOutcome,
    ) -> Result<(), RefineryError> {
        match outcome {
            MergeOutcome::Merged { .. } => Ok(()),
            MergeOutcome::Conflict { details } => self.escalate_conflict(mr, details).await,
            MergeOutcome::TestsFailed { gate, stderr } => {
                let subject = format!("merge gates failed for {}", mr.id);
                let body = format!("gate {} failed:\n{}", gate, stderr);
                self.notify_worker(mr, &subject, &body).await;
                self.record_retry(mr).await;
                self.unclaim(mr).await;
                Ok(())
            }
            MergeOutcome::PushFailed { error } => {
                let subject = format!("push failed for {}", mr.id);
                self.notify_worker(mr, &subject, error).await;
                self.record_retry(mr).await;
                self.unclaim(mr).await;
                Ok(())
            }
            // Nothing a worker can fix; the MR retries silently next cycle.
            MergeOutcome::SlotTimeout => {
                self.unclaim(mr).await;
                Ok(())
            }
            MergeOutcome::Deferred { .. } => {
                self.unclaim(mr).await;
                Ok(())
            }
        }
    }

    /// Create a resolution task and block the MR on it.
    ///
    /// The slot is taken (best-effort) under the conflict holder so the
    /// push path knows resolution is in flight. If another holder owns the
    /// slot the MR is deferred and stays in the queue.
    async fn escalate_conflict(&self, mr: &MrInfo, details: &str) -> Result<(), RefineryError> {
        if !self.slot.try_acquire_for_conflict().await? {
            tracing::info!(mr = %mr.id, "slot held elsewhere, deferring conflict escalation");
            self.unclaim(mr).await;
            return Ok(());
        }

        let target_sha = self
            .git
            .head_sha(&mr.target_branch)
            .await
            .map(|sha| sha.short(12).to_string())
            .unwrap_or_default();
        let metadata = ConflictTaskMetadata {
            merge_request: mr.id.as_str().to_string(),
            branch: mr.branch.clone(),
            target_branch: mr.target_branch.clone(),
            target_sha,
            retry_count: mr.retry_count,
            details: details.to_string(),
            instructions: format!(
                "Rebase {} onto {} and resolve the conflicts, then close this task.",
                mr.branch, mr.target_branch
            ),
        };
        let description = serde_json::to_string_pretty(&metadata).unwrap_or_default();
        let task = self
            .tracker
            .create(NewBead {
                title: format!("Resolve merge conflicts: {}", mr.title),
                kind: "task".to_string(),
                priority: 1,
                description,
                actor: self.actor.clone(),
                labels: vec![
                    CONFLICT_TASK_LABEL.to_string(),
                    format!("rig:{}", self.rig),
                ],
                ephemeral: false,
            })
            .await?;

        self.tracker.add_dependency(&task.id, &mr.id).await?;

        // Assign-back hands the task to the worker that owns the branch.
        if matches!(self.config.on_conflict, dk_core::ConflictPolicy::AssignBack)
            && !mr.worker.is_empty()
        {
            let result = self
                .tracker
                .update(
                    &task.id,
                    BeadUpdate {
                        assignee: Some(mr.worker.clone()),
                        ..Default::default()
                    },
                )
                .await;
            if let Err(err) = result {
                tracing::warn!(task = %task.id, error = %err, "conflict task assignment failed");
            }
        }

        let subject = format!("merge conflicts on {}", mr.branch);
        let body = format!("{}\nresolution task: {}", details, task.id);
        self.notify_worker(mr, &subject, &body).await;
        self.unclaim(mr).await;
        tracing::info!(mr = %mr.id, task = %task.id, "conflict escalated");
        Ok(())
    }

    /// Bump the MR's retry counter; past the limit, park it under the
    /// opt-out label so a human decides.
    async fn record_retry(&self, mr: &MrInfo) {
        let retry_count = mr.retry_count + 1;
        let mut info = mr.clone();
        info.retry_count = retry_count;
        let description = to_json_description(&MrFields::from_info(&info, None));

        let mut update = BeadUpdate {
            description,
            ..Default::default()
        };
        if retry_count >= self.config.max_retries {
            tracing::warn!(mr = %mr.id, retry_count, "retry limit reached, holding");
            let bead = self.tracker.show(&mr.id).await.ok();
            let mut labels = bead.map(|b| b.labels).unwrap_or_default();
            if !labels.iter().any(|l| l == MERGE_OPT_OUT_LABEL) {
                labels.push(MERGE_OPT_OUT_LABEL.to_string());
            }
            update.labels = Some(labels);
        }
        if let Err(err) = self.tracker.update(&mr.id, update).await {
            tracing::warn!(mr = %mr.id, error = %err, "retry bookkeeping failed");
        }
    }

    async fn notify_worker(&self, mr: &MrInfo, subject: &str, body: &str) {
        if mr.worker.is_empty() {
            return;
        }
        if let Err(err) = self.mail.send(&mr.worker, subject, body).await {
            tracing::warn!(to = %mr.worker, error = %err, "worker notification failed");
        }
    }
}

#[derive(Serialize)]
struct ConflictTaskMetadata {
    merge_request: String,
    branch: String,
    target_branch: String,
    /// Prefix of the target head at escalation time, for the resolver to
    /// confirm what the branch was conflicting against.
    target_sha: String,
    retry_count: u32,
    details: String,
    instructions: String,
}

fn to_json_description(fields: &MrFields) -> Option<String> {
    match serde_json::to_string(fields) {
        Ok(json) => Some(json),
        Err(err) => {
            tracing::warn!(error = %err, "merge request reserialization failed");
            None
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
