// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Error types for sleuth-llm

use thiserror::Error;

/// Failure of a single structured-generation call
///
/// Callers treat every variant as recoverable: the parser and analyzer fall
/// back to their heuristic strategies instead of propagating it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The service could not be reached or refused the request
    #[error("Text service unavailable: {reason}")]
    Unavailable {
        /// What went wrong (connection refused, HTTP status, ...)
        reason: String,
    },

    /// The request did not complete within its timeout
    #[error("Text service timed out after {timeout_ms} ms")]
    Timeout {
        /// The timeout that elapsed, in milliseconds
        timeout_ms: u64,
    },

    /// The service answered, but not with usable content
    #[error("Invalid response from text service: {reason}")]
    InvalidResponse {
        /// Why the response was rejected
        reason: String,
    },
}

impl ServiceError {
    /// Shorthand for [`ServiceError::Unavailable`]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`ServiceError::InvalidResponse`]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// True for transport-level failures (unavailable or timed out)
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

/// Errors that can occur while constructing a provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The environment variable holding the API key is unset or empty
    #[error("API key required: set the {env_var} environment variable")]
    MissingApiKey {
        /// Name of the environment variable that was checked
        env_var: String,
    },

    /// The HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// The configured provider name is not known
    #[error("Unknown provider: {name} (expected ollama, openrouter or none)")]
    UnknownProvider {
        /// The provider name as configured
        name: String,
    },
}
