// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

use super::*;

#[tokio::test]
async fn returns_output_on_success() {
    let mut cmd = Command::new("echo");
    cmd.arg("hello");
    let output = run_with_timeout(cmd, Duration::from_secs(5), "echo")
        .await
        .unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
}

#[tokio::test]
async fn reports_timeout_with_description() {
    let mut cmd = Command::new("sleep");
    cmd.arg("10");
    let err = run_with_timeout(cmd, Duration::from_millis(50), "sleepy")
        .await
        .unwrap_err();
    assert!(err.contains("sleepy"), "got: {}", err);
    assert!(err.contains("timed out"), "got: {}", err);
}

#[tokio::test]
async fn reports_spawn_failure() {
    let cmd = Command::new("definitely-not-a-real-binary-xyz");
    let err = run_with_timeout(cmd, Duration::from_secs(1), "missing binary")
        .await
        .unwrap_err();
    assert!(err.contains("missing binary"), "got: {}", err);
}
