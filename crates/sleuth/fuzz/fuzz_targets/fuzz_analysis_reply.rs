// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Fuzz target for analysis reply validation
//!
//! Accepted replies always name the record they were asked about and carry
//! a confidence in [0, 1]; no change-set means no suspected commit.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sleuth::analyzer::analysis_from_reply;
use sleuth_tests::{TestRecord, TestStatus};

fuzz_target!(|data: &[u8]| {
    let Ok(serde_json::Value::Object(reply)) = serde_json::from_slice(data) else {
        return;
    };
    let record = TestRecord::new("test_fuzz", TestStatus::Failed);
    if let Ok(analysis) = analysis_from_reply(&record, None, &reply) {
        assert_eq!(analysis.test_name, "test_fuzz");
        assert!((0.0..=1.0).contains(&analysis.confidence));
        assert!(analysis.suspected_commit.is_none());
    }
});
