// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Deterministic, framework-agnostic result parsing
//!
//! The heuristic parser is the fallback when no text-understanding service
//! is usable. It scans every output line for libtest JSON events, then for
//! framework pass/fail markers, then for summary counts, and assembles a
//! [`ParsedOutput`] with a low fixed confidence.
//!
//! # Example
//!
//! ```
//! use sleuth_tests::{HeuristicParser, RawOutput, TestStatus};
//!
//! let raw = RawOutput::from_capture(
//!     "pytest",
//!     "3 passed, 1 failed\nFAILED test_divide: ZeroDivisionError",
//!     "",
//!     1,
//! );
//! let parsed = HeuristicParser::new().parse(&raw);
//! assert!(parsed.totals().failed >= 1);
//! assert!(parsed.records().iter().any(|r| r.status == TestStatus::Failed
//!     && r.name.contains("test_divide")));
//! ```

use std::collections::HashMap;

use tracing::debug;

use crate::libtest::{self, LibtestEvent};
use crate::markers::{self, LineMatch};
use crate::raw::RawOutput;
use crate::result::{ParseMethod, ParsedOutput, StatusTotals, TestRecord, TestStatus};
use crate::text;

/// Confidence attached to every non-blank heuristic parse
pub const FALLBACK_CONFIDENCE: f64 = 0.3;

/// Upper bound on synthesized placeholder records per status
pub const MAX_PLACEHOLDERS_PER_STATUS: usize = 10_000;

/// Characters of output kept on a whole-run record
const RUN_RECORD_TAIL_CHARS: usize = 2_000;

/// Characters of the command kept in a whole-run record name
const RUN_RECORD_COMMAND_CHARS: usize = 80;

/// Deterministic marker-scanning parser
#[derive(Debug, Clone, Copy)]
pub struct HeuristicParser {
    confidence: f64,
    max_placeholders: usize,
}

impl HeuristicParser {
    /// Create a parser with the default confidence and placeholder cap
    #[must_use]
    pub fn new() -> Self {
        Self {
            confidence: FALLBACK_CONFIDENCE,
            max_placeholders: MAX_PLACEHOLDERS_PER_STATUS,
        }
    }

    /// Override the placeholder cap
    #[must_use]
    pub fn with_max_placeholders(mut self, max: usize) -> Self {
        self.max_placeholders = max;
        self
    }

    /// Parse captured output into a result set
    ///
    /// Never fails: unrecognised output degrades to zero records (clean
    /// exit) or a single `unknown` record standing for the whole run.
    #[must_use]
    pub fn parse(&self, raw: &RawOutput) -> ParsedOutput {
        if raw.is_blank() {
            debug!(command = %raw.command, "Blank output, nothing to parse");
            return ParsedOutput::empty(ParseMethod::Fallback, 0.0);
        }

        let mut collector = RecordCollector::default();
        let mut reported = StatusTotals::default();
        let mut saw_summary = false;

        for line in raw.stdout.lines().chain(raw.stderr.lines()) {
            if let Some(event) = libtest::recognize(line) {
                match event {
                    LibtestEvent::Test(test) => {
                        if let Some(record) = test.into_record() {
                            collector.push(record);
                        }
                    }
                    LibtestEvent::Suite(suite) => {
                        if let Some(totals) = suite.reported_totals() {
                            absorb(&mut reported, &totals);
                            saw_summary = true;
                        }
                    }
                }
                continue;
            }

            match markers::match_line(line) {
                Some(LineMatch::Record(record)) => collector.push(record),
                Some(LineMatch::Counts(totals)) => {
                    absorb(&mut reported, &totals);
                    saw_summary = true;
                }
                None => {}
            }
        }

        let named = collector.len();
        let mut records = collector.into_records();
        if saw_summary {
            self.fill_placeholders(&mut records, &reported);
        }

        if records.is_empty() {
            if !raw.succeeded() {
                records.push(run_record(raw, TestStatus::Unknown));
            }
        } else if raw.timed_out {
            records.push(run_record(raw, TestStatus::Error));
        }

        debug!(
            command = %raw.command,
            named,
            records = records.len(),
            saw_summary,
            "Heuristic parse complete"
        );

        ParsedOutput::new(records, ParseMethod::Fallback, self.confidence)
    }

    /// Add anonymous records where summary counts exceed the named records
    fn fill_placeholders(&self, records: &mut Vec<TestRecord>, reported: &StatusTotals) {
        let named = StatusTotals::from_records(records);
        for status in TestStatus::ALL {
            let missing = reported
                .count(status)
                .saturating_sub(named.count(status))
                .min(self.max_placeholders);
            for n in 1..=missing {
                records.push(TestRecord::new(format!("<{status} #{n}>"), status));
            }
        }
    }
}

impl Default for HeuristicParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse with the default heuristic parser
#[must_use]
pub fn parse_heuristic(raw: &RawOutput) -> ParsedOutput {
    HeuristicParser::new().parse(raw)
}

fn absorb(into: &mut StatusTotals, from: &StatusTotals) {
    for status in TestStatus::ALL {
        into.add(status, from.count(status));
    }
}

/// A record standing for the whole run when no per-test marker resolved
fn run_record(raw: &RawOutput, status: TestStatus) -> TestRecord {
    let name = format!(
        "<run: {}>",
        text::head(raw.command.trim(), RUN_RECORD_COMMAND_CHARS)
    );
    let transcript = raw.transcript();
    let output_tail = text::tail(transcript.trim_end(), RUN_RECORD_TAIL_CHARS);
    let message = if raw.timed_out {
        format!(
            "run timed out after {} ms\n{output_tail}",
            raw.duration_ms
        )
    } else {
        format!("exit code {}\n{output_tail}", raw.exit_code)
    };
    TestRecord::new(name, status).with_error_message(message)
}

/// Collects records in first-seen order, merging repeats by name
#[derive(Debug, Default)]
struct RecordCollector {
    records: Vec<TestRecord>,
    index: HashMap<String, usize>,
}

impl RecordCollector {
    fn push(&mut self, record: TestRecord) {
        match self.index.get(&record.name) {
            Some(&idx) => {
                let existing = &mut self.records[idx];
                existing.status = record.status;
                if existing.error_message.is_none() {
                    existing.error_message = record.error_message;
                }
                if existing.duration_ms.is_none() {
                    existing.duration_ms = record.duration_ms;
                }
                if existing.source_file.is_none() {
                    existing.source_file = record.source_file;
                }
            }
            None => {
                self.index.insert(record.name.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn into_records(self) -> Vec<TestRecord> {
        self.records
    }
}
