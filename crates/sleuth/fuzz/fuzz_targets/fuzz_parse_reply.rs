// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Fuzz target for parse reply validation
//!
//! Any JSON object either fails validation or yields a result set whose
//! totals match its records and whose confidence lies in [0, 1].

#![no_main]

use libfuzzer_sys::fuzz_target;
use sleuth::parser::parsed_from_reply;

fuzz_target!(|data: &[u8]| {
    let Ok(serde_json::Value::Object(reply)) = serde_json::from_slice(data) else {
        return;
    };
    if let Ok(parsed) = parsed_from_reply(&reply) {
        assert_eq!(parsed.totals().total(), parsed.records().len());
        assert!((0.0..=1.0).contains(&parsed.parse_confidence()));
    }
});
