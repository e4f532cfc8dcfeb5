// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

use super::*;
use crate::supervisor::{Supervisor, SupervisorConfig};
use dk_adapters::{FakeMux, FakeProcessTable, MuxCall};
use dk_core::FakeClock;

fn supervisor(mux: FakeMux) -> Supervisor<FakeMux, FakeProcessTable, FakeClock> {
    Supervisor::new(
        mux,
        FakeProcessTable::new(),
        FakeClock::at_epoch(),
        SupervisorConfig::default(),
    )
}

#[tokio::test(start_paused = true)]
async fn trust_dialog_gets_enter() {
    let mux = FakeMux::new().add_session("w");
    mux.set_screen("w", &["Do you trust this folder?", "[Enter to confirm]"]);
    let sup = supervisor(mux.clone());

    let seen_prompt = sup
        .dismiss_dialogs("w", Duration::from_millis(400))
        .await
        .unwrap();
    assert!(!seen_prompt);
    assert!(mux.sent_keys("w").contains(&"Enter".to_string()));
}

#[tokio::test(start_paused = true)]
async fn bypass_dialog_gets_down_enter() {
    let mux = FakeMux::new().add_session("w");
    mux.set_screen("w", &["Bypass Permissions mode", "1. No  2. Yes"]);
    let sup = supervisor(mux.clone());

    sup.dismiss_dialogs("w", Duration::from_millis(400))
        .await
        .unwrap();
    let keys = mux.sent_keys("w");
    let down = keys.iter().position(|k| k == "Down").unwrap();
    let enter = keys.iter().position(|k| k == "Enter").unwrap();
    assert!(down < enter);
}

#[tokio::test(start_paused = true)]
async fn prompt_indicator_short_circuits() {
    let mux = FakeMux::new().add_session("w");
    mux.set_screen("w", &["welcome", "❯ "]);
    let sup = supervisor(mux.clone());

    let seen_prompt = sup
        .dismiss_dialogs("w", Duration::from_secs(5))
        .await
        .unwrap();
    assert!(seen_prompt);
    assert!(mux.sent_keys("w").is_empty());
}

#[tokio::test(start_paused = true)]
async fn blind_dismissal_is_enter_down_enter() {
    let mux = FakeMux::new().add_session("w");
    let sup = supervisor(mux.clone());

    sup.dismiss_dialogs_blind("w").await.unwrap();
    assert_eq!(mux.sent_keys("w"), ["Enter", "Down", "Enter"]);
}

#[yare::parameterized(
    ready            = { &["some output", "❯ "], true },
    busy             = { &["❯ thinking...", "(esc to interrupt)"], false },
    no_prompt        = { &["$ compiling", "..."], false },
)]
fn idle_is_ready_and_not_interruptible(lines: &[&str], expected: bool) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async {
        let mux = FakeMux::new().add_session("w");
        mux.set_screen("w", lines);
        let sup = supervisor(mux);
        assert_eq!(sup.is_idle("w").await.unwrap(), expected);
    });
}

#[tokio::test(start_paused = true)]
async fn wait_for_idle_returns_when_prompt_appears() {
    let mux = FakeMux::new().add_session("w");
    mux.set_screen("w", &["❯ "]);
    let sup = supervisor(mux);
    sup.wait_for_idle("w", Duration::from_secs(2)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn wait_for_idle_times_out_with_named_error() {
    let mux = FakeMux::new().add_session("w");
    mux.set_screen("w", &["still working", "(esc to interrupt)"]);
    let sup = supervisor(mux);

    let err = sup
        .wait_for_idle("w", Duration::from_millis(600))
        .await
        .unwrap_err();
    assert!(matches!(err, SupervisorError::IdleTimeout));
}

#[tokio::test(start_paused = true)]
async fn wait_for_idle_passes_through_session_gone() {
    let sup = supervisor(FakeMux::new());
    let err = sup
        .wait_for_idle("gone", Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(err, SupervisorError::SessionNotFound(_)));
}

#[test]
fn dialog_markers_are_nonempty() {
    assert!(!AGENT_READY_MARKER.is_empty());
    assert!(!AGENT_BUSY_MARKER.is_empty());
}
