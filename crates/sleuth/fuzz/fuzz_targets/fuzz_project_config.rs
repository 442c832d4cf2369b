// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Fuzz target for project file parsing

#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use sleuth::config::FileConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = FileConfig::from_json(text, Path::new("sleuth.json"));
    }
});
