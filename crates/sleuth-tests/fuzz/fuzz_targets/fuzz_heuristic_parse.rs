// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Fuzz target for heuristic result parsing
//!
//! Arbitrary text is fed through the marker scanner as stdout with a failing
//! exit code, the path that exercises every recognizer.

#![no_main]

use libfuzzer_sys::fuzz_target;

use sleuth_tests::{RawOutput, parse_heuristic};

fuzz_target!(|data: &[u8]| {
    let input = String::from_utf8_lossy(data);
    let parsed = parse_heuristic(&RawOutput::from_capture("fuzz", input, "", 1));
    assert_eq!(parsed.totals().total(), parsed.records().len());
});
