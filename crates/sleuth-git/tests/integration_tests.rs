// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Integration tests for sleuth-git
//!
//! These tests build scratch repositories with git2 and check the change-set
//! handed to failure analysis.

use std::fs;
use std::path::Path;

use git2::{Oid, Repository, Signature};
use sleuth_git::{ChangeSetOptions, CommitSummary, FileStatus, GitRepo, rank_files};

fn commit_all(repo: &Repository, message: &str) -> Oid {
    let mut index = repo.index().expect("index");
    index
        .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
        .expect("add all");
    index.write().expect("write index");
    let tree = repo
        .find_tree(index.write_tree().expect("write tree"))
        .expect("find tree");
    let sig = Signature::now("Ada", "ada@example.com").expect("signature");
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .expect("commit")
}

fn write(root: &Path, path: &str, content: &str) {
    let full = root.join(path);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    fs::write(full, content).expect("write file");
}

#[test]
fn test_changeset_ranks_relevant_file_first() {
    let dir = tempfile::tempdir().expect("tempdir");
    let repo = Repository::init(dir.path()).expect("init");

    write(dir.path(), "src/calc.py", "def divide(a, b):\n    return a // b\n");
    write(dir.path(), "src/io.py", "def read():\n    pass\n");
    write(dir.path(), "docs/usage.md", "# Usage\n");
    let base = commit_all(&repo, "initial import");

    write(dir.path(), "docs/usage.md", "# Usage\n\nDivide numbers.\n");
    write(dir.path(), "src/calc.py", "def divide(a, b):\n    return a / b\n");
    let fix = commit_all(&repo, "calc: use true division");

    let git = GitRepo::discover(dir.path().join("src")).expect("discover from subdir");
    let changes = git
        .changeset(&ChangeSetOptions::since(&base.to_string()))
        .expect("changeset");

    assert_eq!(changes.files.len(), 2);
    assert!(changes.files.iter().all(|f| f.status == FileStatus::Modified));

    let ranked = rank_files(&changes, "tests/test_calc.py::test_divide", None);
    assert_eq!(ranked[0].file.path, "src/calc.py");
    assert_eq!(ranked[0].score, 1);
    assert_eq!(ranked[1].score, 0);

    let short = &fix.to_string()[..7];
    let resolved = changes.resolve_commit(short).expect("short hash resolves");
    assert_eq!(resolved.hash, fix.to_string());
    assert!(CommitSummary::is_valid_sha(&resolved.hash));
    assert_eq!(resolved.author, "Ada");
}

#[test]
fn test_changeset_serializes_for_prompts_and_reports() {
    let dir = tempfile::tempdir().expect("tempdir");
    let repo = Repository::init(dir.path()).expect("init");
    write(dir.path(), "main.go", "package main\n");
    commit_all(&repo, "first");

    let git = GitRepo::open(dir.path()).expect("open");
    let changes = git.changeset(&ChangeSetOptions::default()).expect("changeset");
    let json = serde_json::to_value(&changes).expect("serialize");

    assert_eq!(json["files"][0]["path"], "main.go");
    assert_eq!(json["files"][0]["status"], "added");
    assert_eq!(json["commits"][0]["subject"], "first");
}
