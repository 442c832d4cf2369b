// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Commit summaries carried in a change-set

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest subject kept on a summary, in characters
pub const MAX_SUBJECT_CHARS: usize = 80;

/// Shortest hex prefix accepted when resolving a commit reference
pub const MIN_PREFIX_LEN: usize = 7;

/// One commit in the range under analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    /// The full commit hash (40 hex characters)
    pub hash: String,
    /// Author name
    pub author: String,
    /// Commit timestamp
    pub date: DateTime<Utc>,
    /// First line of the message, capped at [`MAX_SUBJECT_CHARS`]
    pub subject: String,
}

impl CommitSummary {
    /// Build a summary from a full commit message
    #[must_use]
    pub fn new(
        hash: impl Into<String>,
        author: impl Into<String>,
        date: DateTime<Utc>,
        message: &str,
    ) -> Self {
        Self {
            hash: hash.into(),
            author: author.into(),
            date,
            subject: subject_of(message),
        }
    }

    /// Validate that a hash is a valid 40-character hex string
    #[must_use]
    pub fn is_valid_sha(sha: &str) -> bool {
        sha.len() == 40 && sha.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// Get the short hash (first 7 characters)
    #[must_use]
    pub fn short_hash(&self) -> &str {
        self.hash.get(..MIN_PREFIX_LEN).unwrap_or(&self.hash)
    }

    /// Whether `candidate` is an abbreviation of this commit's hash
    ///
    /// Requires at least [`MIN_PREFIX_LEN`] hex characters; matching ignores
    /// ASCII case.
    #[must_use]
    pub fn matches_prefix(&self, candidate: &str) -> bool {
        let candidate = candidate.trim();
        candidate.len() >= MIN_PREFIX_LEN
            && candidate.chars().all(|c| c.is_ascii_hexdigit())
            && self
                .hash
                .get(..candidate.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(candidate))
    }
}

/// First line of a commit message, capped at [`MAX_SUBJECT_CHARS`]
#[must_use]
pub fn subject_of(message: &str) -> String {
    let line = message.lines().next().unwrap_or("").trim();
    line.chars().take(MAX_SUBJECT_CHARS).collect()
}
