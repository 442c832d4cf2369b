// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! libtest JSON event recognition
//!
//! `cargo test -- -Z unstable-options --format json` and
//! `cargo nextest run --message-format libtest-json` both emit one JSON
//! event per line. When such lines appear in captured output they are the
//! most reliable marker available, so the heuristic parser checks them first.
//!
//! # Example
//!
//! ```
//! use sleuth_tests::libtest::{LibtestEvent, parse_event};
//!
//! let event = parse_event(r#"{"type":"test","event":"ok","name":"c::b$t","exec_time":0.01}"#)
//!     .unwrap();
//! let LibtestEvent::Test(test) = event else { panic!("expected test event") };
//! assert_eq!(test.into_record().unwrap().name, "t");
//! ```

use serde::{Deserialize, Serialize};

use crate::error::TestsError;
use crate::result::{StatusTotals, TestRecord, TestStatus};

/// A single event from libtest JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LibtestEvent {
    /// Suite started/finished event
    Suite(SuiteEvent),
    /// Test event (started, ok, failed, ignored)
    Test(TestEvent),
}

/// Suite-level event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteEvent {
    /// Event type: "started" or "ok"/"failed"
    pub event: String,
    /// Number of tests (only in "started" event)
    pub test_count: Option<usize>,
    /// Number of passed tests (in final event)
    pub passed: Option<usize>,
    /// Number of failed tests (in final event)
    pub failed: Option<usize>,
    /// Number of ignored tests (in final event)
    pub ignored: Option<usize>,
    /// Execution time (in final event)
    pub exec_time: Option<f64>,
}

impl SuiteEvent {
    /// Counts reported by a finished suite, `None` for the "started" event
    #[must_use]
    pub fn reported_totals(&self) -> Option<StatusTotals> {
        if self.event == "started" {
            return None;
        }
        let mut totals = StatusTotals::default();
        totals.add(TestStatus::Passed, self.passed.unwrap_or(0));
        totals.add(TestStatus::Failed, self.failed.unwrap_or(0));
        totals.add(TestStatus::Skipped, self.ignored.unwrap_or(0));
        Some(totals)
    }
}

/// Test-level event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestEvent {
    /// Event type: "started", "ok", "failed", "ignored", "timeout"
    pub event: String,
    /// Full test name including binary
    pub name: String,
    /// Execution time in seconds (only in finished events)
    pub exec_time: Option<f64>,
    /// Captured output (only in failed events)
    pub stdout: Option<String>,
}

impl TestEvent {
    /// Convert a finished test event into a record; `None` for "started"
    #[must_use]
    pub fn into_record(self) -> Option<TestRecord> {
        let status = match self.event.as_str() {
            "started" => return None,
            "ok" => TestStatus::Passed,
            "failed" => TestStatus::Failed,
            "ignored" => TestStatus::Skipped,
            "timeout" => TestStatus::Error,
            _ => TestStatus::Unknown,
        };

        let mut record = TestRecord::new(normalize_test_name(&self.name), status);
        if let Some(secs) = self.exec_time.filter(|t| t.is_finite() && *t >= 0.0) {
            record = record.with_duration_ms((secs * 1000.0).round() as u64);
        }
        if let Some(output) = self.stdout {
            record = record.with_error_message(output);
        }
        Some(record)
    }
}

/// Parse a single libtest JSON event
///
/// # Errors
///
/// Returns `TestsError::JsonParse` if the line is not a libtest event.
pub fn parse_event(json: &str) -> Result<LibtestEvent, TestsError> {
    serde_json::from_str(json).map_err(TestsError::from)
}

/// Recognise a line as a libtest event without allocating for plain text
#[must_use]
pub fn recognize(line: &str) -> Option<LibtestEvent> {
    let line = line.trim();
    if !line.starts_with('{') || !line.contains("\"type\"") {
        return None;
    }
    parse_event(line).ok()
}

/// Normalize a nextest test name to a clean format
///
/// Input: "sleuth-tests::sleuth_tests$result::tests::test_name"
/// Output: "result::tests::test_name"
fn normalize_test_name(name: &str) -> String {
    // nextest joins binary id and test path with '$'
    if let Some(idx) = name.find('$') {
        name[idx + 1..].to_string()
    } else {
        name.to_string()
    }
}
