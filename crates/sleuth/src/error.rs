// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Error types for the sleuth pipeline

use std::path::PathBuf;

use sleuth_llm::ServiceError;
use sleuth_tests::{ParsedOutput, RawOutput};
use thiserror::Error;

/// Conditions that stop a test command from running at all
///
/// A non-zero exit or a timeout is a normal outcome and never appears here.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The shell could not find the command
    #[error("Command not found: {}", .raw.command)]
    CommandNotFound {
        /// Whatever the shell printed before giving up
        raw: Box<RawOutput>,
    },

    /// The command exists but could not be executed
    #[error("Permission denied running: {}", .raw.command)]
    PermissionDenied {
        /// Whatever the shell printed before giving up
        raw: Box<RawOutput>,
    },

    /// The command line was empty
    #[error("Test command is empty")]
    EmptyCommand,

    /// The working directory is missing or not a directory
    #[error("Working directory not found: {}", .path.display())]
    WorkingDirectory {
        /// The directory that was requested
        path: PathBuf,
    },

    /// The shell itself could not be spawned
    #[error("Failed to spawn shell: {0}")]
    Spawn(#[from] std::io::Error),

    /// The run was cancelled while the command was executing
    #[error("Execution cancelled")]
    Cancelled,
}

impl ExecutionError {
    /// Output captured before the failure, if any
    #[must_use]
    pub fn captured(&self) -> Option<&RawOutput> {
        match self {
            ExecutionError::CommandNotFound { raw } | ExecutionError::PermissionDenied { raw } => {
                Some(raw)
            }
            _ => None,
        }
    }
}

/// Why a strategy could not produce a usable structured reply
#[derive(Debug, Error)]
pub enum StrategyError {
    /// Transport or availability failure
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The reply did not match the expected shape, even after a retry
    #[error("Malformed response: {reason}")]
    Malformed {
        /// What was wrong with the last reply
        reason: String,
    },

    /// The run was cancelled while waiting for a reply
    #[error("Request cancelled")]
    Cancelled,
}

/// Terminal failures of a run
#[derive(Debug, Error)]
pub enum RunError {
    /// The command could not be executed
    #[error("{error}")]
    Execution {
        /// The underlying execution failure
        #[source]
        error: ExecutionError,
        /// Parse of any output captured before the failure
        parsed: Option<Box<ParsedOutput>>,
    },

    /// The run was cancelled before any records were produced
    #[error("Run cancelled")]
    Cancelled,
}
