// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Change-set types
//!
//! A [`ChangeSet`] is the read-only snapshot of recent modifications shared
//! by every failure analysis in a run.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::commit::CommitSummary;

/// How a file changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// New file
    Added,
    /// Content changed
    Modified,
    /// File removed
    Deleted,
    /// File moved, possibly with edits
    Renamed,
    /// File copied from another path
    Copied,
    /// Present in the working tree but not tracked
    Untracked,
    /// Any other delta kind
    Unknown,
}

impl FileStatus {
    /// Lowercase label
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FileStatus::Added => "added",
            FileStatus::Modified => "modified",
            FileStatus::Deleted => "deleted",
            FileStatus::Renamed => "renamed",
            FileStatus::Copied => "copied",
            FileStatus::Untracked => "untracked",
            FileStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<git2::Delta> for FileStatus {
    fn from(delta: git2::Delta) -> Self {
        match delta {
            git2::Delta::Added => FileStatus::Added,
            git2::Delta::Deleted => FileStatus::Deleted,
            git2::Delta::Modified | git2::Delta::Typechange => FileStatus::Modified,
            git2::Delta::Renamed => FileStatus::Renamed,
            git2::Delta::Copied => FileStatus::Copied,
            git2::Delta::Untracked => FileStatus::Untracked,
            _ => FileStatus::Unknown,
        }
    }
}

/// One changed file with its unified diff text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    /// Path relative to the repository root, '/'-separated
    pub path: String,
    /// Unified diff for this file (may be empty for binary files)
    pub diff: String,
    /// Change kind
    pub status: FileStatus,
}

impl ChangedFile {
    /// Create a changed file entry
    #[must_use]
    pub fn new(path: impl Into<String>, status: FileStatus, diff: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            diff: diff.into(),
            status,
        }
    }
}

/// Recent modifications used as analysis context
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Changed files, in repository diff order
    pub files: Vec<ChangedFile>,
    /// Commits in the range, newest first
    pub commits: Vec<CommitSummary>,
}

impl ChangeSet {
    /// Create a change-set
    #[must_use]
    pub fn new(files: Vec<ChangedFile>, commits: Vec<CommitSummary>) -> Self {
        Self { files, commits }
    }

    /// True when there are neither files nor commits
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.commits.is_empty()
    }

    /// Resolve an abbreviated hash to a commit in this change-set
    ///
    /// Returns `None` when nothing matches or when the prefix is ambiguous.
    #[must_use]
    pub fn resolve_commit(&self, prefix: &str) -> Option<&CommitSummary> {
        let mut matches = self.commits.iter().filter(|c| c.matches_prefix(prefix));
        let first = matches.next()?;
        matches.next().is_none().then_some(first)
    }

    /// Whether `path` is one of the changed files
    #[must_use]
    pub fn contains_path(&self, path: &str) -> bool {
        self.files.iter().any(|f| f.path == path)
    }
}
