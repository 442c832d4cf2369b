// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Error types for sleuth-git

use thiserror::Error;

/// Errors that can occur while building a change-set
#[derive(Debug, Error)]
pub enum GitError {
    /// Error from git2 library
    #[error("Git error: {0}")]
    Git2(#[from] git2::Error),

    /// No repository contains the specified path
    #[error("Repository not found: {path}")]
    RepositoryNotFound {
        /// The path that was searched for a repository
        path: String,
    },

    /// The comparison ref (branch, tag, or SHA) could not be resolved
    #[error("Invalid commit reference: {reference}")]
    InvalidReference {
        /// The reference string that could not be resolved
        reference: String,
    },

    /// Uncommitted changes were requested from a bare repository
    #[error("Repository has no working directory: {path}")]
    BareRepository {
        /// Path of the bare repository
        path: String,
    },
}
