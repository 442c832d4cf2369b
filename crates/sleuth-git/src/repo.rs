// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Building a change-set from a git repository
//!
//! This module turns a ref range (and optionally the uncommitted working
//! tree) into a [`ChangeSet`] using the `git2` crate.

use std::path::Path;

use chrono::{DateTime, Utc};
use git2::{Diff, DiffOptions, Patch, Repository, Sort};
use tracing::debug;

use crate::change::{ChangeSet, ChangedFile, FileStatus};
use crate::commit::CommitSummary;
use crate::error::GitError;

/// Default number of commits collected
pub const DEFAULT_MAX_COMMITS: usize = 10;

/// Default cap on the diff text kept per file, in characters
pub const DEFAULT_MAX_DIFF_CHARS: usize = 20_000;

/// Which changes to collect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSetOptions {
    /// Compare against this ref; `None` means the last commit only
    pub compare_ref: Option<String>,
    /// Include staged, unstaged and untracked changes in the working tree
    pub include_uncommitted: bool,
    /// Maximum number of commits collected
    pub max_commits: usize,
    /// Diff text kept per file, in characters
    pub max_diff_chars: usize,
}

impl Default for ChangeSetOptions {
    fn default() -> Self {
        Self {
            compare_ref: None,
            include_uncommitted: false,
            max_commits: DEFAULT_MAX_COMMITS,
            max_diff_chars: DEFAULT_MAX_DIFF_CHARS,
        }
    }
}

impl ChangeSetOptions {
    /// Collect everything since `reference` (branch, tag, or SHA)
    #[must_use]
    pub fn since(reference: &str) -> Self {
        Self {
            compare_ref: Some(reference.to_string()),
            ..Default::default()
        }
    }

    /// Also collect uncommitted changes
    #[must_use]
    pub fn with_uncommitted(mut self) -> Self {
        self.include_uncommitted = true;
        self
    }

    /// Set the commit limit
    #[must_use]
    pub fn with_max_commits(mut self, n: usize) -> Self {
        self.max_commits = n;
        self
    }
}

/// A git repository wrapper for building change-sets
pub struct GitRepo {
    repo: Repository,
}

impl GitRepo {
    /// Open a git repository at the given path
    ///
    /// # Errors
    ///
    /// Returns `GitError::RepositoryNotFound` if the path is not a git repository.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GitError> {
        let path = path.as_ref();
        let repo = Repository::open(path).map_err(|_| GitError::RepositoryNotFound {
            path: path.display().to_string(),
        })?;
        Ok(Self { repo })
    }

    /// Discover and open a git repository containing the given path
    ///
    /// This walks up the directory tree to find a `.git` directory.
    ///
    /// # Errors
    ///
    /// Returns `GitError::RepositoryNotFound` if no repository is found.
    pub fn discover(path: impl AsRef<Path>) -> Result<Self, GitError> {
        let path = path.as_ref();
        let repo = Repository::discover(path).map_err(|_| GitError::RepositoryNotFound {
            path: path.display().to_string(),
        })?;
        Ok(Self { repo })
    }

    /// Get the working directory path (None for bare repos)
    #[must_use]
    pub fn workdir(&self) -> Option<&Path> {
        self.repo.workdir()
    }

    /// Get the HEAD commit SHA, `None` for a repository without commits
    #[must_use]
    pub fn head_sha(&self) -> Option<String> {
        self.head_commit().map(|c| c.id().to_string())
    }

    /// Build the change-set described by `options`
    ///
    /// # Errors
    ///
    /// Returns `GitError::InvalidReference` if the comparison ref cannot be
    /// resolved, `GitError::BareRepository` when uncommitted changes are
    /// requested from a bare repository, and `GitError::Git2` for other
    /// repository failures.
    pub fn changeset(&self, options: &ChangeSetOptions) -> Result<ChangeSet, GitError> {
        let commits = self.commits_in_range(options)?;
        let files = self.changed_files(options)?;
        debug!(
            compare_ref = ?options.compare_ref,
            uncommitted = options.include_uncommitted,
            files = files.len(),
            commits = commits.len(),
            "Built change-set"
        );
        Ok(ChangeSet::new(files, commits))
    }

    fn head_commit(&self) -> Option<git2::Commit<'_>> {
        self.repo.head().ok()?.peel_to_commit().ok()
    }

    fn resolve(&self, reference: &str) -> Result<git2::Commit<'_>, GitError> {
        let invalid = || GitError::InvalidReference {
            reference: reference.to_string(),
        };
        self.repo
            .revparse_single(reference)
            .map_err(|_| invalid())?
            .peel_to_commit()
            .map_err(|_| invalid())
    }

    /// Commits reachable from HEAD but not from the comparison ref, newest first
    fn commits_in_range(&self, options: &ChangeSetOptions) -> Result<Vec<CommitSummary>, GitError> {
        if self.head_commit().is_none() {
            return Ok(Vec::new());
        }

        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TIME | Sort::TOPOLOGICAL)?;
        revwalk.push_head()?;
        if let Some(reference) = &options.compare_ref {
            revwalk.hide(self.resolve(reference)?.id())?;
        }

        let mut commits = Vec::new();
        for oid in revwalk.take(options.max_commits) {
            let git_commit = self.repo.find_commit(oid?)?;
            let date = DateTime::from_timestamp(git_commit.time().seconds(), 0)
                .unwrap_or_else(Utc::now);
            commits.push(CommitSummary::new(
                git_commit.id().to_string(),
                git_commit.author().name().unwrap_or("Unknown"),
                date,
                git_commit.message().unwrap_or(""),
            ));
        }
        Ok(commits)
    }

    fn changed_files(&self, options: &ChangeSetOptions) -> Result<Vec<ChangedFile>, GitError> {
        let head = self.head_commit();

        let base_tree = match &options.compare_ref {
            Some(reference) => Some(self.resolve(reference)?.tree()?),
            None if options.include_uncommitted => head.as_ref().map(|c| c.tree()).transpose()?,
            // Last commit only
            None => match &head {
                Some(commit) if commit.parent_count() > 0 => Some(commit.parent(0)?.tree()?),
                _ => None,
            },
        };

        let mut diff_opts = DiffOptions::new();
        let diff = if options.include_uncommitted {
            if self.repo.is_bare() {
                return Err(GitError::BareRepository {
                    path: self.repo.path().display().to_string(),
                });
            }
            diff_opts
                .include_untracked(true)
                .recurse_untracked_dirs(true)
                .show_untracked_content(true);
            self.repo
                .diff_tree_to_workdir_with_index(base_tree.as_ref(), Some(&mut diff_opts))?
        } else {
            let head_tree = head.as_ref().map(|c| c.tree()).transpose()?;
            self.repo
                .diff_tree_to_tree(base_tree.as_ref(), head_tree.as_ref(), Some(&mut diff_opts))?
        };

        collect_files(&diff, options.max_diff_chars)
    }
}

fn collect_files(diff: &Diff<'_>, max_diff_chars: usize) -> Result<Vec<ChangedFile>, GitError> {
    let mut files = Vec::new();
    for (idx, delta) in diff.deltas().enumerate() {
        let path = delta
            .new_file()
            .path()
            .or_else(|| delta.old_file().path())
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_else(|| "<unknown>".to_string());

        let text = match Patch::from_diff(diff, idx)? {
            Some(mut patch) => {
                let buf = patch.to_buf()?;
                String::from_utf8_lossy(&buf).chars().take(max_diff_chars).collect()
            }
            None => String::new(),
        };

        files.push(ChangedFile::new(path, FileStatus::from(delta.status()), text));
    }
    Ok(files)
}
