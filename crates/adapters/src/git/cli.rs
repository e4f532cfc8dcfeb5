// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Git adapter shelling out to `git -C <rig checkout>`.

use super::{GitAdapter, GitError, SquashResult, SubmoduleChange};
use crate::subprocess::{run_with_timeout, GIT_TIMEOUT};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Output;
use tokio::process::Command;

/// CLI git bound to one repository checkout.
#[derive(Clone)]
pub struct CliGit {
    repo: PathBuf,
}

impl CliGit {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }

    pub fn repo(&self) -> &std::path::Path {
        &self.repo
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(&self.repo);
        cmd
    }

    async fn run(&self, args: &[&str], desc: &str) -> Result<Output, GitError> {
        let mut cmd = self.command();
        cmd.args(args);
        let output = run_with_timeout(cmd, GIT_TIMEOUT, desc)
            .await
            .map_err(GitError::CommandFailed)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitError::CommandFailed(format!(
                "{}: {}",
                desc,
                stderr.trim()
            )));
        }
        Ok(output)
    }

    async fn ref_exists(&self, full_ref: &str) -> Result<bool, GitError> {
        let mut cmd = self.command();
        cmd.args(["show-ref", "--verify", "--quiet", full_ref]);
        let output = run_with_timeout(cmd, GIT_TIMEOUT, "git show-ref")
            .await
            .map_err(GitError::CommandFailed)?;
        Ok(output.status.success())
    }

    /// Conflicted paths from the index, via the porcelain diff-filter.
    async fn conflicted_files(&self) -> Result<Vec<String>, GitError> {
        let output = self
            .run(
                &["diff", "--name-only", "--diff-filter=U"],
                "git diff --diff-filter=U",
            )
            .await?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }
}

#[async_trait]
impl GitAdapter for CliGit {
    async fn branch_exists_local(&self, branch: &str) -> Result<bool, GitError> {
        self.ref_exists(&format!("refs/heads/{}", branch)).await
    }

    async fn branch_exists_remote(&self, branch: &str) -> Result<bool, GitError> {
        self.ref_exists(&format!("refs/remotes/origin/{}", branch))
            .await
    }

    async fn checkout(&self, branch: &str) -> Result<(), GitError> {
        self.run(&["checkout", branch], "git checkout").await?;
        Ok(())
    }

    async fn pull(&self, branch: &str) -> Result<(), GitError> {
        self.run(&["pull", "origin", branch], "git pull").await?;
        Ok(())
    }

    async fn merge_would_conflict(&self, source: &str, target: &str) -> Result<bool, GitError> {
        let mut cmd = self.command();
        cmd.args(["merge-tree", "--write-tree", target, source]);
        let output = run_with_timeout(cmd, GIT_TIMEOUT, "git merge-tree")
            .await
            .map_err(GitError::CommandFailed)?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(GitError::CommandFailed(format!(
                "git merge-tree: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }

    async fn squash_merge(&self, source: &str) -> Result<SquashResult, GitError> {
        let mut cmd = self.command();
        cmd.args(["merge", "--squash", source]);
        let output = run_with_timeout(cmd, GIT_TIMEOUT, "git merge --squash")
            .await
            .map_err(GitError::CommandFailed)?;
        if output.status.success() {
            return Ok(SquashResult::default());
        }
        // The merge stopped; distinguish conflicts from hard failures by
        // the index, not by stderr strings.
        let conflicts = self.conflicted_files().await?;
        if conflicts.is_empty() {
            return Err(GitError::CommandFailed(format!(
                "git merge --squash: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(SquashResult { conflicts })
    }

    async fn abort_merge(&self) -> Result<(), GitError> {
        self.run(&["reset", "--merge"], "git reset --merge").await?;
        Ok(())
    }

    async fn commit(&self, message: &str) -> Result<String, GitError> {
        self.run(&["commit", "--no-verify", "-m", message], "git commit")
            .await?;
        let output = self.run(&["rev-parse", "HEAD"], "git rev-parse").await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn head_message(&self, branch: &str) -> Result<String, GitError> {
        let output = self
            .run(&["log", "-1", "--format=%B", branch], "git log -1")
            .await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }

    async fn head_sha(&self, branch: &str) -> Result<String, GitError> {
        let output = self.run(&["rev-parse", branch], "git rev-parse").await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn push(&self, branch: &str) -> Result<(), GitError> {
        self.run(&["push", "origin", branch], "git push").await?;
        Ok(())
    }

    async fn reset_hard(&self, to_ref: &str) -> Result<(), GitError> {
        self.run(&["reset", "--hard", to_ref], "git reset --hard")
            .await?;
        Ok(())
    }

    async fn delete_branch_local(&self, branch: &str) -> Result<(), GitError> {
        self.run(&["branch", "-D", branch], "git branch -D").await?;
        Ok(())
    }

    async fn delete_branch_remote(&self, branch: &str) -> Result<(), GitError> {
        self.run(
            &["push", "origin", "--delete", branch],
            "git push --delete",
        )
        .await?;
        Ok(())
    }

    async fn prune_remote(&self) -> Result<(), GitError> {
        self.run(&["remote", "prune", "origin"], "git remote prune")
            .await?;
        Ok(())
    }

    async fn submodule_pointer_changes(
        &self,
        source: &str,
        target: &str,
    ) -> Result<Vec<SubmoduleChange>, GitError> {
        let range = format!("{}..{}", target, source);
        let output = self
            .run(&["diff", "--raw", &range], "git diff --raw")
            .await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut changes = Vec::new();
        for line in stdout.lines() {
            // Raw format: ":<old mode> <new mode> <old sha> <new sha> <status>\t<path>"
            let Some(rest) = line.strip_prefix(':') else {
                continue;
            };
            let Some((meta, path)) = rest.split_once('\t') else {
                continue;
            };
            let fields: Vec<&str> = meta.split_whitespace().collect();
            if fields.len() < 4 || fields[1] != "160000" {
                continue;
            }
            changes.push(SubmoduleChange {
                path: path.to_string(),
                sha: fields[3].to_string(),
            });
        }
        Ok(changes)
    }

    async fn ensure_submodules_initialized(&self) -> Result<(), GitError> {
        self.run(
            &["submodule", "update", "--init", "--recursive"],
            "git submodule update",
        )
        .await?;
        Ok(())
    }

    async fn push_submodule(&self, path: &str) -> Result<(), GitError> {
        let submodule_dir = self.repo.join(path);
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(&submodule_dir).args(["push", "origin", "HEAD"]);
        let output = run_with_timeout(cmd, GIT_TIMEOUT, "git push (submodule)")
            .await
            .map_err(GitError::CommandFailed)?;
        if !output.status.success() {
            return Err(GitError::CommandFailed(format!(
                "git push (submodule {}): {}",
                path,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}
