// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Captured output of a single test command invocation

use std::borrow::Cow;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Separator placed between stdout and stderr in a combined transcript
pub const STDERR_SEPARATOR: &str = "\n--- stderr ---\n";

/// Unmodified capture of one test command run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOutput {
    /// The command line as given
    pub command: String,
    /// Working directory the command ran in
    pub cwd: PathBuf,
    /// Process exit code (-1 when killed by a signal or timed out)
    pub exit_code: i32,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Wall-clock duration from spawn to exit or termination
    pub duration_ms: u64,
    /// Whether the run was terminated for exceeding its timeout
    pub timed_out: bool,
    /// When the process was spawned
    pub started_at: DateTime<Utc>,
}

impl RawOutput {
    /// Wrap output captured elsewhere (piped in or read from a file)
    #[must_use]
    pub fn from_capture(
        command: impl Into<String>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        exit_code: i32,
    ) -> Self {
        Self {
            command: command.into(),
            cwd: std::env::current_dir().unwrap_or_default(),
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            duration_ms: 0,
            timed_out: false,
            started_at: Utc::now(),
        }
    }

    /// Duration as a [`Duration`]
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// True when both streams are empty or whitespace
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.stdout.trim().is_empty() && self.stderr.trim().is_empty()
    }

    /// True when the command exited 0 within its timeout
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// Stdout followed by stderr (when non-blank) as one text
    #[must_use]
    pub fn transcript(&self) -> Cow<'_, str> {
        if self.stderr.trim().is_empty() {
            Cow::Borrowed(&self.stdout)
        } else if self.stdout.is_empty() {
            Cow::Borrowed(&self.stderr)
        } else {
            Cow::Owned(format!("{}{STDERR_SEPARATOR}{}", self.stdout, self.stderr))
        }
    }

    /// The metadata subset handed to storage and reporting
    #[must_use]
    pub fn metadata(&self) -> RunMetadata {
        RunMetadata {
            command: self.command.clone(),
            exit_code: self.exit_code,
            duration_ms: self.duration_ms,
            timed_out: self.timed_out,
            started_at: self.started_at,
        }
    }
}

/// Execution metadata without the captured streams
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// The command line as given
    pub command: String,
    /// Process exit code
    pub exit_code: i32,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Whether the run hit its timeout
    pub timed_out: bool,
    /// When the process was spawned
    pub started_at: DateTime<Utc>,
}
