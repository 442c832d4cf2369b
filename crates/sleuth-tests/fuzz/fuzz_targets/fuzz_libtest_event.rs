// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Fuzz target for libtest JSON event recognition

#![no_main]

use libfuzzer_sys::fuzz_target;

use sleuth_tests::libtest::{LibtestEvent, recognize};

fuzz_target!(|data: &[u8]| {
    if let Ok(line) = std::str::from_utf8(data) {
        // recognize should never panic on any input
        if let Some(LibtestEvent::Test(test)) = recognize(line) {
            let _ = test.into_record();
        }
    }
});
