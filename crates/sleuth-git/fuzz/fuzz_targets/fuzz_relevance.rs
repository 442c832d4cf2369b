// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Fuzz target for test-name tokenization and file ranking
//!
//! The first line is taken as a test name, every further line as a changed
//! file path.

#![no_main]

use libfuzzer_sys::fuzz_target;

use sleuth_git::{ChangeSet, ChangedFile, FileStatus, rank_files};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let mut lines = input.lines();
        let name = lines.next().unwrap_or_default();
        let files = lines
            .map(|path| ChangedFile::new(path, FileStatus::Modified, ""))
            .collect();
        let changes = ChangeSet::new(files, Vec::new());
        let ranked = rank_files(&changes, name, None);
        assert_eq!(ranked.len(), changes.files.len());
    }
});
