// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Quality gate execution.

use async_trait::async_trait;
use dk_core::{GateDef, GateResult};
use std::path::PathBuf;
use std::time::Duration;

/// Default per-gate timeout when the gate does not set one.
const DEFAULT_GATE_TIMEOUT: Duration = Duration::from_secs(600);

/// Gate failures report at most this much stderr.
const STDERR_SNIPPET_BYTES: usize = 500;

/// Runs one gate command.
#[async_trait]
pub trait GateRunner: Clone + Send + Sync + 'static {
    async fn run_gate(&self, gate: &GateDef) -> GateResult;
}

/// Runs gate commands through `sh -c` in the rig checkout.
#[derive(Clone)]
pub struct ShellGateRunner {
    cwd: PathBuf,
}

impl ShellGateRunner {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }
}

#[async_trait]
impl GateRunner for ShellGateRunner {
    async fn run_gate(&self, gate: &GateDef) -> GateResult {
        let timeout = gate.timeout.unwrap_or(DEFAULT_GATE_TIMEOUT);
        let started = std::time::Instant::now();

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(&gate.run).current_dir(&self.cwd);

        let outcome = tokio::time::timeout(timeout, cmd.output()).await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(Ok(output)) if output.status.success() => GateResult {
                name: gate.name.clone(),
                success: true,
                error: String::new(),
                elapsed,
            },
            Ok(Ok(output)) => GateResult {
                name: gate.name.clone(),
                success: false,
                error: stderr_snippet(&String::from_utf8_lossy(&output.stderr)),
                elapsed,
            },
            Ok(Err(io_err)) => GateResult {
                name: gate.name.clone(),
                success: false,
                error: format!("failed to run: {}", io_err),
                elapsed,
            },
            Err(_) => GateResult {
                name: gate.name.clone(),
                success: false,
                error: format!("timed out after {}s", timeout.as_secs()),
                elapsed,
            },
        }
    }
}

/// Run gates in order (already sorted by name by the config).
///
/// Sequential mode stops at the first failure; parallel mode launches all,
/// waits for all, and reports results in name order.
pub async fn run_gates<R: GateRunner>(
    runner: &R,
    gates: &[GateDef],
    parallel: bool,
) -> Vec<GateResult> {
    if parallel {
        let mut set = tokio::task::JoinSet::new();
        for gate in gates {
            let runner = runner.clone();
            let gate = gate.clone();
            set.spawn(async move { runner.run_gate(&gate).await });
        }
        let mut results = Vec::with_capacity(gates.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(join_err) => results.push(GateResult {
                    name: "<panicked>".to_string(),
                    success: false,
                    error: join_err.to_string(),
                    elapsed: Duration::ZERO,
                }),
            }
        }
        results.sort_by(|a, b| a.name.cmp(&b.name));
        results
    } else {
        let mut results = Vec::with_capacity(gates.len());
        for gate in gates {
            let result = runner.run_gate(gate).await;
            let failed = !result.success;
            results.push(result);
            if failed {
                break;
            }
        }
        results
    }
}

/// Trailing snippet of stderr, capped at a char boundary.
fn stderr_snippet(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_SNIPPET_BYTES {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - STDERR_SNIPPET_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}

/// Scripted gate runner for tests.
#[cfg(any(test, feature = "test-support"))]
#[derive(Clone)]
pub struct FakeGateRunner {
    failures: std::sync::Arc<parking_lot::Mutex<std::collections::HashMap<String, String>>>,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for FakeGateRunner {
    fn default() -> Self {
        Self {
            failures: std::sync::Arc::new(parking_lot::Mutex::new(
                std::collections::HashMap::new(),
            )),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl FakeGateRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a named gate fail with the given stderr.
    pub fn fail_gate(&self, name: &str, stderr: &str) {
        self.failures
            .lock()
            .insert(name.to_string(), stderr.to_string());
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl GateRunner for FakeGateRunner {
    async fn run_gate(&self, gate: &GateDef) -> GateResult {
        match self.failures.lock().get(&gate.name) {
            Some(stderr) => GateResult {
                name: gate.name.clone(),
                success: false,
                error: stderr_snippet(stderr),
                elapsed: Duration::ZERO,
            },
            None => GateResult {
                name: gate.name.clone(),
                success: true,
                error: String::new(),
                elapsed: Duration::ZERO,
            },
        }
    }
}

#[cfg(test)]
#[path = "gates_tests.rs"]
mod tests;
