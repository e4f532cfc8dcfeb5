// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

//! Derrick daemon (dkd)
//!
//! Long-running control plane for one town: supervises agent sessions,
//! runs the dispatch ticker, the merge queue, the alarm loop, and the
//! session-health patrol.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use dk_daemon::{Daemon, LifecycleError};
use dk_storage::RuntimeDir;
use std::path::PathBuf;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut town_root: Option<PathBuf> = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("dkd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" => {
                println!("dkd {}", env!("CARGO_PKG_VERSION"));
                println!("Derrick daemon - the town control plane");
                println!();
                println!("USAGE:");
                println!("    dkd [TOWN_ROOT]");
                println!();
                println!("TOWN_ROOT defaults to $DERRICK_TOWN_ROOT, then the current directory.");
                return Ok(());
            }
            other if town_root.is_none() && !other.starts_with('-') => {
                town_root = Some(PathBuf::from(other));
            }
            other => {
                eprintln!("error: unexpected argument '{other}'");
                eprintln!("Usage: dkd [TOWN_ROOT]");
                std::process::exit(1);
            }
        }
    }

    let town_root = match town_root {
        Some(root) => root,
        None => std::env::var_os("DERRICK_TOWN_ROOT")
            .map(PathBuf::from)
            .unwrap_or(std::env::current_dir()?),
    };

    let _log_guard = setup_logging(&town_root)?;

    info!(town_root = %town_root.display(), "starting control plane");
    let daemon = match Daemon::start(town_root).await {
        Ok(daemon) => daemon,
        Err(LifecycleError::LockHeld(path)) => {
            error!(lock = %path.display(), "another control plane is already running");
            std::process::exit(1);
        }
        Err(err) => return Err(err.into()),
    };

    wait_for_shutdown_signal().await;
    info!("shutdown signal received");
    daemon.shutdown().await;
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(err) => {
            error!(error = %err, "signal handler unavailable");
            return;
        }
    };
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(err) => {
            error!(error = %err, "signal handler unavailable");
            return;
        }
    };
    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
}

fn setup_logging(
    town_root: &std::path::Path,
) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    let runtime = RuntimeDir::new(town_root);
    runtime.ensure()?;
    let appender = tracing_appender::rolling::never(runtime.logs_dir(), "dkd.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_env("DERRICK_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}
