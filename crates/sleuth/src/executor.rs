// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Test command execution
//!
//! Runs one command line through the platform shell and captures its output.
//! A non-zero exit is a normal result. On timeout or cancellation the whole
//! process group is killed and whatever was captured so far is kept.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use chrono::Utc;
use sleuth_tests::RawOutput;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::ExecutionError;

/// How long to wait for the pipes to drain after the process ends
pub const IO_CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum bytes captured per stream
pub const MAX_OUTPUT_BYTES: usize = 50 * 1024 * 1024;

/// Exit code recorded when the process was killed or ended by a signal
pub const KILLED_EXIT_CODE: i32 = -1;

/// POSIX shell status for "command not found"
#[cfg(unix)]
const SHELL_NOT_FOUND: i32 = 127;

/// POSIX shell status for "found but not executable"
#[cfg(unix)]
const SHELL_NOT_EXECUTABLE: i32 = 126;

/// `cmd.exe` status for an unrecognised command
#[cfg(windows)]
const SHELL_NOT_FOUND: i32 = 9009;

/// One command to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    /// Shell command line
    pub command: String,
    /// Working directory
    pub cwd: PathBuf,
    /// Variables added to the inherited environment
    pub env: BTreeMap<String, String>,
    /// Wall-clock limit
    pub timeout: Duration,
}

impl ExecRequest {
    /// Create a request with no environment overrides
    #[must_use]
    pub fn new(command: impl Into<String>, cwd: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            cwd: cwd.into(),
            env: BTreeMap::new(),
            timeout,
        }
    }

    /// Add one environment override
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Add several environment overrides
    #[must_use]
    pub fn with_envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

/// How the child process ended
#[derive(Debug)]
enum ProcessOutcome {
    /// Exited on its own
    Completed(ExitStatus),
    /// Killed after exceeding the timeout
    TimedOut,
    /// Killed because the run was cancelled
    Cancelled,
}

/// Run a command to completion, timeout or cancellation
///
/// # Errors
///
/// Returns `ExecutionError::CommandNotFound` or
/// `ExecutionError::PermissionDenied` (with the captured output attached)
/// when the shell reports it could not run the command, `EmptyCommand` or
/// `WorkingDirectory` for unusable requests, `Spawn` if the shell cannot be
/// started, and `Cancelled` if `cancel` fires first.
#[instrument(skip(request, cancel), fields(command = %request.command))]
pub async fn execute(
    request: &ExecRequest,
    cancel: &CancellationToken,
) -> Result<RawOutput, ExecutionError> {
    if request.command.trim().is_empty() {
        return Err(ExecutionError::EmptyCommand);
    }
    if !request.cwd.is_dir() {
        return Err(ExecutionError::WorkingDirectory {
            path: request.cwd.clone(),
        });
    }

    let mut cmd = shell_command(&request.command);
    cmd.current_dir(&request.cwd)
        .envs(&request.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let started_at = Utc::now();
    let started = Instant::now();
    let mut child = cmd.spawn()?;
    let pid = child.id();
    debug!(pid = ?pid, cwd = %request.cwd.display(), "spawned test command");

    let stdout_task = child
        .stdout
        .take()
        .map(|stdout| tokio::spawn(read_bounded(stdout, MAX_OUTPUT_BYTES)));
    let stderr_task = child
        .stderr
        .take()
        .map(|stderr| tokio::spawn(read_bounded(stderr, MAX_OUTPUT_BYTES)));

    let outcome = tokio::select! {
        status = child.wait() => ProcessOutcome::Completed(status?),
        () = tokio::time::sleep(request.timeout) => {
            warn!(timeout_ms = millis(request.timeout), "test command timed out; killing");
            kill_tree(&mut child, pid).await;
            ProcessOutcome::TimedOut
        }
        () = cancel.cancelled() => {
            info!("cancellation requested; killing test command");
            kill_tree(&mut child, pid).await;
            ProcessOutcome::Cancelled
        }
    };
    let duration = started.elapsed();

    let stdout = collect_stream(stdout_task, "stdout").await;
    let stderr = collect_stream(stderr_task, "stderr").await;

    let (exit_code, timed_out) = match outcome {
        ProcessOutcome::Completed(status) => (status.code().unwrap_or(KILLED_EXIT_CODE), false),
        ProcessOutcome::TimedOut => (KILLED_EXIT_CODE, true),
        ProcessOutcome::Cancelled => return Err(ExecutionError::Cancelled),
    };

    let raw = RawOutput {
        command: request.command.clone(),
        cwd: request.cwd.clone(),
        exit_code,
        stdout,
        stderr,
        duration_ms: millis(duration),
        timed_out,
        started_at,
    };

    info!(
        exit_code = raw.exit_code,
        duration_ms = raw.duration_ms,
        timed_out = raw.timed_out,
        stdout_bytes = raw.stdout.len(),
        stderr_bytes = raw.stderr.len(),
        "test command finished"
    );

    classify(raw)
}

/// Map shell-reserved exit statuses onto execution errors
fn classify(raw: RawOutput) -> Result<RawOutput, ExecutionError> {
    if raw.timed_out {
        return Ok(raw);
    }
    match raw.exit_code {
        SHELL_NOT_FOUND => Err(ExecutionError::CommandNotFound { raw: Box::new(raw) }),
        #[cfg(unix)]
        SHELL_NOT_EXECUTABLE => Err(ExecutionError::PermissionDenied { raw: Box::new(raw) }),
        _ => Ok(raw),
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command).process_group(0);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

/// Kill the child and everything it started
async fn kill_tree(child: &mut Child, pid: Option<u32>) {
    if let Some(pid) = pid {
        signal_group(pid).await;
    }
    if let Err(err) = child.kill().await {
        debug!(error = %err, "kill after group signal failed");
    }
}

/// SIGKILL every process in the group led by `pid`
#[cfg(unix)]
async fn signal_group(pid: u32) {
    let status = Command::new("kill")
        .args(["-s", "KILL", "--", &format!("-{pid}")])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match status {
        Ok(status) if !status.success() => debug!(pid, %status, "group kill reported failure"),
        Err(err) => debug!(pid, error = %err, "group kill could not run"),
        Ok(_) => {}
    }
}

#[cfg(not(unix))]
async fn signal_group(_pid: u32) {}

/// Read a stream to EOF, keeping at most `max_bytes`
///
/// Reading continues past the limit so the writer never blocks on a full
/// pipe.
async fn read_bounded<R: tokio::io::AsyncRead + Unpin>(
    mut reader: R,
    max_bytes: usize,
) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(8192);
    let mut chunk = [0u8; 8192];
    let mut dropped = 0usize;

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let room = max_bytes.saturating_sub(buf.len());
        let keep = n.min(room);
        buf.extend_from_slice(&chunk[..keep]);
        dropped += n - keep;
    }

    if dropped > 0 {
        warn!(max_bytes, dropped, "output exceeded capture limit; truncated");
    }
    Ok(buf)
}

/// Join a capture task, giving up after [`IO_CAPTURE_TIMEOUT`]
async fn collect_stream(
    task: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    stream: &'static str,
) -> String {
    let Some(task) = task else {
        return String::new();
    };
    let bytes = match timeout(IO_CAPTURE_TIMEOUT, task).await {
        Ok(Ok(Ok(buf))) => buf,
        Ok(Ok(Err(err))) => {
            warn!(stream, error = %err, "capture failed");
            Vec::new()
        }
        Ok(Err(err)) => {
            warn!(stream, error = %err, "capture task panicked");
            Vec::new()
        }
        Err(_) => {
            warn!(stream, "capture timed out");
            Vec::new()
        }
    };
    String::from_utf8_lossy(&bytes).into_owned()
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
