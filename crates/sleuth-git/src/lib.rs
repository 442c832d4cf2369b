// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! sleuth-git: Change-set context for sleuth failure analysis
//!
//! This library crate models the recent code modifications handed to the
//! failure analyzer (changed files with their diffs, and commit summaries),
//! ranks changed files by lexical relevance to a failing test, and builds a
//! [`ChangeSet`] from a git repository.

//! # Example
//!
//! ```no_run
//! use sleuth_git::{ChangeSetOptions, GitRepo};
//!
//! let repo = GitRepo::discover(".").expect("open repo");
//! let changes = repo
//!     .changeset(&ChangeSetOptions::since("origin/main").with_uncommitted())
//!     .expect("build change-set");
//!
//! for file in &changes.files {
//!     println!("{} {}", file.status, file.path);
//! }
//! ```

#![warn(missing_docs)]

pub mod change;
pub mod commit;
pub mod error;
pub mod relevance;
pub mod repo;

pub use change::{ChangeSet, ChangedFile, FileStatus};
pub use commit::CommitSummary;
pub use error::GitError;
pub use relevance::{RankedFile, best_score, rank_files, tokenize};
pub use repo::{ChangeSetOptions, GitRepo};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::change::{ChangeSet, ChangedFile, FileStatus};
    pub use crate::commit::CommitSummary;
    pub use crate::error::GitError;
    pub use crate::repo::{ChangeSetOptions, GitRepo};
}
