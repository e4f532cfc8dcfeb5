// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

use super::*;
use crate::supervisor::{Supervisor, SupervisorConfig};
use dk_adapters::{FakeMux, FakeProcessTable};
use dk_core::FakeClock;

fn supervisor(mux: FakeMux) -> Supervisor<FakeMux, FakeProcessTable, FakeClock> {
    Supervisor::new(
        mux,
        FakeProcessTable::new(),
        FakeClock::at_epoch(),
        SupervisorConfig::default(),
    )
}

#[tokio::test]
async fn install_sets_the_pane_died_hook() {
    let mux = FakeMux::new().add_session("w");
    let sup = supervisor(mux.clone());

    sup.install_respawn_hook("w", "claude --resume abc").await.unwrap();

    let hook = mux.get_session("w").unwrap().pane_died_hook.unwrap();
    assert!(hook.contains("sleep 3"), "hook: {}", hook);
    assert!(hook.contains("respawn-pane -k"), "hook: {}", hook);
    assert!(hook.contains("remain-on-exit on"), "hook: {}", hook);
    assert!(hook.contains("claude --resume abc"), "hook: {}", hook);
    assert!(hook.contains("pane_dead"), "hook: {}", hook);
}

#[tokio::test]
async fn install_replaces_previous_hook() {
    let mux = FakeMux::new().add_session("w");
    let sup = supervisor(mux.clone());

    sup.install_respawn_hook("w", "first-command").await.unwrap();
    sup.install_respawn_hook("w", "second-command").await.unwrap();

    let hook = mux.get_session("w").unwrap().pane_died_hook.unwrap();
    assert!(hook.contains("second-command"));
    assert!(!hook.contains("first-command"));
}

#[tokio::test]
async fn remove_clears_the_hook() {
    let mux = FakeMux::new().add_session("w");
    let sup = supervisor(mux.clone());

    sup.install_respawn_hook("w", "claude").await.unwrap();
    sup.remove_respawn_hook("w").await.unwrap();
    assert!(mux.get_session("w").unwrap().pane_died_hook.is_none());
}

#[test]
fn hook_command_escapes_single_quotes() {
    let hook = build_respawn_hook("sock", "w", "sh -c 'echo hi'");
    assert!(hook.contains(r"'\''"), "hook: {}", hook);
    assert!(hook.contains("tmux -L sock"), "hook: {}", hook);
}
