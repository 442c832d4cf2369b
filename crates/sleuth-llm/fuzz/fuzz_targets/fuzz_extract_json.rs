// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Fuzz target for JSON extraction from model replies

#![no_main]

use libfuzzer_sys::fuzz_target;

use sleuth_llm::extract_json;

fuzz_target!(|data: &[u8]| {
    if let Ok(reply) = std::str::from_utf8(data) {
        if let Some(found) = extract_json(reply) {
            assert!(serde_json::from_str::<serde_json::Value>(found).is_ok());
        }
    }
});
