// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Structured test result types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TestsError;

/// Outcome of a single test, from a closed set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// Test passed
    Passed,
    /// Test failed an assertion
    Failed,
    /// Test was skipped or ignored
    Skipped,
    /// Test could not run to completion (setup error, crash, timeout)
    Error,
    /// No framework marker could be resolved
    Unknown,
}

impl TestStatus {
    /// Every status, in report order
    pub const ALL: [TestStatus; 5] = [
        TestStatus::Passed,
        TestStatus::Failed,
        TestStatus::Skipped,
        TestStatus::Error,
        TestStatus::Unknown,
    ];

    /// Lowercase label used in serialized output
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Skipped => "skipped",
            TestStatus::Error => "error",
            TestStatus::Unknown => "unknown",
        }
    }

    /// Whether this status counts against the run (failed or error)
    #[must_use]
    pub fn is_failing(self) -> bool {
        matches!(self, TestStatus::Failed | TestStatus::Error)
    }

    /// Map a framework or model label onto the closed set
    ///
    /// Accepts the canonical labels plus the synonyms common test frameworks
    /// print (`ok`, `fail`, `ignored`, `xfail`, ...). Matching is
    /// case-insensitive. Returns `None` for anything else.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let status = match label.trim().to_ascii_lowercase().as_str() {
            "passed" | "pass" | "ok" | "success" | "xpass" | "xpassed" => TestStatus::Passed,
            "failed" | "fail" | "failure" | "failing" => TestStatus::Failed,
            "skipped" | "skip" | "ignored" | "pending" | "xfail" | "xfailed" => {
                TestStatus::Skipped
            }
            "error" | "errored" | "timeout" | "timedout" => TestStatus::Error,
            "unknown" => TestStatus::Unknown,
            _ => return None,
        };
        Some(status)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestStatus {
    type Err = TestsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| TestsError::UnknownStatus {
            label: s.to_string(),
        })
    }
}

/// A single discovered test and its outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecord {
    /// Test identifier as printed by the framework
    pub name: String,
    /// Test outcome
    pub status: TestStatus,
    /// Duration in milliseconds, when the framework printed one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Failure or error text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Source file the test lives in, when identifiable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

impl TestRecord {
    /// Create a record with only a name and status
    #[must_use]
    pub fn new(name: impl Into<String>, status: TestStatus) -> Self {
        Self {
            name: name.into(),
            status,
            duration_ms: None,
            error_message: None,
            source_file: None,
        }
    }

    /// Attach a duration
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Attach error text; blank text is ignored
    #[must_use]
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        if !message.trim().is_empty() {
            self.error_message = Some(message);
        }
        self
    }

    /// Attach the source file
    #[must_use]
    pub fn with_source_file(mut self, path: impl Into<String>) -> Self {
        self.source_file = Some(path.into());
        self
    }

    /// Check if the test passed
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == TestStatus::Passed
    }

    /// Check if the test failed or errored
    #[must_use]
    pub fn is_failing(&self) -> bool {
        self.status.is_failing()
    }
}

/// Number of records per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTotals {
    /// Passed tests
    pub passed: usize,
    /// Failed tests
    pub failed: usize,
    /// Skipped tests
    pub skipped: usize,
    /// Errored tests
    pub error: usize,
    /// Tests with unresolved status
    pub unknown: usize,
}

impl StatusTotals {
    /// Count records by status
    #[must_use]
    pub fn from_records(records: &[TestRecord]) -> Self {
        let mut totals = Self::default();
        for record in records {
            totals.add(record.status, 1);
        }
        totals
    }

    /// Add `n` to the bucket for `status`
    pub fn add(&mut self, status: TestStatus, n: usize) {
        let slot = match status {
            TestStatus::Passed => &mut self.passed,
            TestStatus::Failed => &mut self.failed,
            TestStatus::Skipped => &mut self.skipped,
            TestStatus::Error => &mut self.error,
            TestStatus::Unknown => &mut self.unknown,
        };
        *slot = slot.saturating_add(n);
    }

    /// Count for a single status
    #[must_use]
    pub fn count(&self, status: TestStatus) -> usize {
        match status {
            TestStatus::Passed => self.passed,
            TestStatus::Failed => self.failed,
            TestStatus::Skipped => self.skipped,
            TestStatus::Error => self.error,
            TestStatus::Unknown => self.unknown,
        }
    }

    /// Sum over all statuses
    #[must_use]
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.error + self.unknown
    }

    /// True when nothing failed or errored
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.error == 0
    }
}

/// Which strategy produced a [`ParsedOutput`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMethod {
    /// Text-understanding service
    Llm,
    /// Deterministic heuristic scan
    Fallback,
}

impl fmt::Display for ParseMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseMethod::Llm => f.write_str("llm"),
            ParseMethod::Fallback => f.write_str("fallback"),
        }
    }
}

/// Reported totals that disagreed with the returned record list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalsDiscrepancy {
    /// Total the strategy claimed
    pub reported_total: usize,
    /// Number of records it actually returned
    pub record_count: usize,
}

/// Structured result set derived from one [`RawOutput`](crate::RawOutput)
///
/// Totals are always derived from the record list, so
/// `totals().total() == records().len()` holds for every value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedOutput {
    records: Vec<TestRecord>,
    totals: StatusTotals,
    parse_method: ParseMethod,
    parse_confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    discrepancy: Option<TotalsDiscrepancy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reported_duration_ms: Option<u64>,
}

impl ParsedOutput {
    /// Build a result set; totals are computed and confidence clamped
    #[must_use]
    pub fn new(records: Vec<TestRecord>, parse_method: ParseMethod, confidence: f64) -> Self {
        let totals = StatusTotals::from_records(&records);
        Self {
            records,
            totals,
            parse_method,
            parse_confidence: clamp_confidence(confidence),
            discrepancy: None,
            reported_duration_ms: None,
        }
    }

    /// An empty result set
    #[must_use]
    pub fn empty(parse_method: ParseMethod, confidence: f64) -> Self {
        Self::new(Vec::new(), parse_method, confidence)
    }

    /// Record a disagreement between reported and derived totals
    #[must_use]
    pub fn with_discrepancy(mut self, discrepancy: TotalsDiscrepancy) -> Self {
        self.discrepancy = Some(discrepancy);
        self
    }

    /// Record the run duration the framework reported
    #[must_use]
    pub fn with_reported_duration_ms(mut self, duration_ms: u64) -> Self {
        self.reported_duration_ms = Some(duration_ms);
        self
    }

    /// Records in the order the strategy produced them
    #[must_use]
    pub fn records(&self) -> &[TestRecord] {
        &self.records
    }

    /// Per-status counts
    #[must_use]
    pub fn totals(&self) -> &StatusTotals {
        &self.totals
    }

    /// Strategy that produced this result
    #[must_use]
    pub fn parse_method(&self) -> ParseMethod {
        self.parse_method
    }

    /// Confidence in [0, 1]
    #[must_use]
    pub fn parse_confidence(&self) -> f64 {
        self.parse_confidence
    }

    /// Totals disagreement flagged during reconciliation
    #[must_use]
    pub fn discrepancy(&self) -> Option<&TotalsDiscrepancy> {
        self.discrepancy.as_ref()
    }

    /// Duration reported by the framework, if any
    #[must_use]
    pub fn reported_duration_ms(&self) -> Option<u64> {
        self.reported_duration_ms
    }

    /// Records with status failed or error
    pub fn failing_records(&self) -> impl Iterator<Item = &TestRecord> {
        self.records.iter().filter(|r| r.is_failing())
    }

    /// Check if nothing failed or errored
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.totals.is_success()
    }
}

/// Clamp a self-reported confidence into [0, 1]; NaN becomes 0
#[must_use]
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
