// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

use super::*;

#[yare::parameterized(
    simple      = { "polecat-1", true },
    underscores = { "rig_alpha_witness", true },
    digits_only = { "42", true },
    empty       = { "", false },
    dot         = { "a.b", false },
    slash       = { "rig/witness", false },
    space       = { "a b", false },
    unicode     = { "sessión", false },
)]
fn session_name_charset(name: &str, ok: bool) {
    assert_eq!(validate_session_name(name), ok);
}

#[yare::parameterized(
    healthy      = { SessionHealth::Healthy, "healthy" },
    session_dead = { SessionHealth::SessionDead, "session-dead" },
    agent_dead   = { SessionHealth::AgentDead, "agent-dead" },
    agent_hung   = { SessionHealth::AgentHung, "agent-hung" },
)]
fn health_display(health: SessionHealth, expected: &str) {
    assert_eq!(health.as_str(), expected);
    assert_eq!(health.to_string(), expected);
}

#[test]
fn health_serializes_kebab_case() {
    assert_eq!(
        serde_json::to_string(&SessionHealth::SessionDead).unwrap(),
        "\"session-dead\""
    );
}
