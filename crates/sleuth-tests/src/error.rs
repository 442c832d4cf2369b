// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Error types for sleuth-tests

use thiserror::Error;

/// Errors that can occur while handling captured test output
#[derive(Debug, Error)]
pub enum TestsError {
    /// Error parsing JSON
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A status label outside the closed status set
    #[error("Unknown test status: {label}")]
    UnknownStatus {
        /// The label that could not be mapped
        label: String,
    },
}
