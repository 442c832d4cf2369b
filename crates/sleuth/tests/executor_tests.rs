// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Executor tests against a real shell
//!
//! These tests spawn `sh -c` and therefore only run on Unix.

#![cfg(unix)]

use std::time::{Duration, Instant};

use sleuth::error::ExecutionError;
use sleuth::executor::{ExecRequest, KILLED_EXIT_CODE, execute};
use tokio_util::sync::CancellationToken;

fn request(command: &str, timeout_secs: u64) -> ExecRequest {
    ExecRequest::new(command, std::env::temp_dir(), Duration::from_secs(timeout_secs))
}

// ============================================================================
// Normal completion
// ============================================================================

#[tokio::test]
async fn test_captures_stdout_and_exit_code() {
    let raw = execute(&request("echo hello; exit 3", 10), &CancellationToken::new())
        .await
        .expect("command should run");

    assert_eq!(raw.stdout.trim(), "hello");
    assert_eq!(raw.exit_code, 3);
    assert!(!raw.timed_out);
    assert!(!raw.succeeded());
}

#[tokio::test]
async fn test_captures_stderr_separately() {
    let raw = execute(&request("echo out; echo err >&2", 10), &CancellationToken::new())
        .await
        .expect("command should run");

    assert_eq!(raw.stdout.trim(), "out");
    assert_eq!(raw.stderr.trim(), "err");
    assert!(raw.transcript().contains("--- stderr ---"));
}

#[tokio::test]
async fn test_runs_in_requested_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("marker.txt"), "found").expect("write marker");

    let req = ExecRequest::new("cat marker.txt", dir.path(), Duration::from_secs(10));
    let raw = execute(&req, &CancellationToken::new()).await.expect("command should run");
    assert_eq!(raw.stdout, "found");
}

#[tokio::test]
async fn test_environment_overrides_are_applied() {
    let req = request("printf '%s' \"$SLEUTH_TEST_VALUE\"", 10).with_env("SLEUTH_TEST_VALUE", "42");
    let raw = execute(&req, &CancellationToken::new()).await.expect("command should run");
    assert_eq!(raw.stdout, "42");
}

#[tokio::test]
async fn test_silent_success_is_blank() {
    let raw = execute(&request("true", 10), &CancellationToken::new())
        .await
        .expect("command should run");
    assert!(raw.is_blank());
    assert!(raw.succeeded());
}

// ============================================================================
// Timeout
// ============================================================================

#[tokio::test]
async fn test_timeout_kills_and_returns_partial_output() {
    let started = Instant::now();
    let raw = execute(&request("echo before; sleep 5; echo after", 1), &CancellationToken::new())
        .await
        .expect("timeout is not an error");

    assert!(raw.timed_out);
    assert_eq!(raw.exit_code, KILLED_EXIT_CODE);
    assert!(raw.stdout.contains("before"));
    assert!(!raw.stdout.contains("after"));
    assert!(
        started.elapsed() < Duration::from_secs(4),
        "timed out run took {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_timeout_kills_background_children() {
    // The grandchild holds stdout open; it must die with the group
    let started = Instant::now();
    let raw = execute(&request("sleep 30 & sleep 30", 1), &CancellationToken::new())
        .await
        .expect("timeout is not an error");

    assert!(raw.timed_out);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_timeout_kills_detached_grandchild() {
    // Output is redirected so only the group signal can stop the writer
    let dir = tempfile::tempdir().expect("tempdir");
    let marker = dir.path().join("late.txt");
    let command = format!("(sleep 2; echo late > '{}') >/dev/null 2>&1 &\nsleep 30", marker.display());
    let raw = execute(&request(&command, 1), &CancellationToken::new())
        .await
        .expect("timeout is not an error");
    assert!(raw.timed_out);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!marker.exists(), "background writer outlived the timeout");
}

// ============================================================================
// Execution errors
// ============================================================================

#[tokio::test]
async fn test_command_not_found_carries_output() {
    let err = execute(
        &request("definitely-not-a-real-command-sleuth", 10),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    match err {
        ExecutionError::CommandNotFound { raw } => {
            assert_eq!(raw.exit_code, 127);
            assert!(raw.stderr.contains("not found"));
        }
        other => panic!("expected CommandNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_permission_denied() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = dir.path().join("run.sh");
    std::fs::write(&script, "#!/bin/sh\necho hi\n").expect("write script");

    let req = ExecRequest::new("./run.sh", dir.path(), Duration::from_secs(10));
    let err = execute(&req, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, ExecutionError::PermissionDenied { .. }));
}

#[tokio::test]
async fn test_empty_command_rejected() {
    let err = execute(&request("   ", 10), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutionError::EmptyCommand));
}

#[tokio::test]
async fn test_missing_working_directory_rejected() {
    let req = ExecRequest::new("true", "/nonexistent/sleuth/dir", Duration::from_secs(10));
    let err = execute(&req, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, ExecutionError::WorkingDirectory { .. }));
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancellation_stops_command() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = execute(&request("sleep 10", 60), &cancel).await.unwrap_err();
    assert!(matches!(err, ExecutionError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
}
