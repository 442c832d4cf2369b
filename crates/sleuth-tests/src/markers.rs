// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Line-level pass/fail marker recognition for common test frameworks
//!
//! Each recognizer looks at a single line and either resolves it to a named
//! [`TestRecord`] or to summary counts. Nothing here knows about whole runs;
//! [`crate::heuristic`] assembles the per-line matches.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::result::{StatusTotals, TestRecord, TestStatus};

/// What a single line resolved to
#[derive(Debug, Clone, PartialEq)]
pub enum LineMatch {
    /// A named test with its outcome
    Record(TestRecord),
    /// Summary counts such as `3 passed, 1 failed`
    Counts(StatusTotals),
}

static CARGO_TEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^test (?P<name>.+?) \.\.\. (?P<status>ok|FAILED|ignored)\b").expect("valid regex")
});

static GO_TEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*--- (?P<status>PASS|FAIL|SKIP): (?P<name>\S+)(?: \((?P<secs>[0-9.]+)s\))?")
        .expect("valid regex")
});

static PYTEST_VERBOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>\S*::\S+)\s+(?P<status>PASSED|FAILED|SKIPPED|ERROR|XFAIL|XPASS)\b")
        .expect("valid regex")
});

static GENERIC_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?P<status>PASSED|FAILED|ERROR|SKIPPED):?\s+(?P<name>\S+?)(?:(?::\s+|\s+-\s+)(?P<message>.*?))?\s*$",
    )
    .expect("valid regex")
});

static UNITTEST_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<status>FAIL|ERROR): (?P<name>\S+) \((?P<module>[^)]+)\)").expect("valid regex")
});

static UNITTEST_VERBOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>\S+) \((?P<module>[^)]+)\) \.\.\. (?P<status>ok|FAIL|ERROR|skipped)")
        .expect("valid regex")
});

static SYMBOL_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<symbol>[✓✔√✕✗×○])\s+(?P<name>.+?)(?:\s+\((?P<ms>\d+)\s*ms\))?\s*$")
        .expect("valid regex")
});

static SUMMARY_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<count>\d+) (?P<label>passed|failed|skipped|ignored|xfailed|xpassed|errors?)\b")
        .expect("valid regex")
});

/// Resolve a single output line
#[must_use]
pub fn match_line(line: &str) -> Option<LineMatch> {
    match_record(line)
        .map(LineMatch::Record)
        .or_else(|| summary_counts(line).map(LineMatch::Counts))
}

/// Resolve a line to a named test record
#[must_use]
pub fn match_record(line: &str) -> Option<TestRecord> {
    let line = line.trim_end();

    if let Some(caps) = CARGO_TEST.captures(line) {
        return record_from(&caps, &caps["name"]);
    }
    if let Some(caps) = GO_TEST.captures(line) {
        let record = record_from(&caps, &caps["name"])?;
        return Some(match caps.name("secs").and_then(|s| s.as_str().parse::<f64>().ok()) {
            Some(secs) => record.with_duration_ms((secs * 1000.0).round() as u64),
            None => record,
        });
    }
    if let Some(caps) = PYTEST_VERBOSE.captures(line) {
        return record_from(&caps, &caps["name"]);
    }
    if let Some(caps) = UNITTEST_HEADER.captures(line) {
        let name = format!("{}.{}", &caps["module"], &caps["name"]);
        return record_from(&caps, &name);
    }
    if let Some(caps) = UNITTEST_VERBOSE.captures(line) {
        let name = format!("{}.{}", &caps["module"], &caps["name"]);
        return record_from(&caps, &name);
    }
    if let Some(caps) = GENERIC_MARKER.captures(line) {
        let record = record_from(&caps, &caps["name"])?;
        return Some(match caps.name("message") {
            Some(message) => record.with_error_message(message.as_str()),
            None => record,
        });
    }
    if let Some(caps) = SYMBOL_MARKER.captures(line) {
        let status = match &caps["symbol"] {
            "✓" | "✔" | "√" => TestStatus::Passed,
            "✕" | "✗" | "×" => TestStatus::Failed,
            _ => TestStatus::Skipped,
        };
        let record = named(caps["name"].trim(), status);
        return Some(match caps.name("ms").and_then(|m| m.as_str().parse::<u64>().ok()) {
            Some(ms) => record.with_duration_ms(ms),
            None => record,
        });
    }
    None
}

/// Extract summary counts from lines such as `=== 3 passed, 1 failed in 0.2s ===`
///
/// Only lines reporting at least one passed or failed count qualify, so
/// prose that happens to contain "2 errors" is not taken as a summary.
#[must_use]
pub fn summary_counts(line: &str) -> Option<StatusTotals> {
    // Jest prints suite-level counts alongside test-level counts
    if line.contains("Suites:") {
        return None;
    }

    let mut totals = StatusTotals::default();
    let mut qualifies = false;
    for caps in SUMMARY_COUNT.captures_iter(line) {
        let Ok(count) = caps["count"].parse::<usize>() else {
            continue;
        };
        let status = match &caps["label"] {
            "passed" | "xpassed" => TestStatus::Passed,
            "failed" => TestStatus::Failed,
            "skipped" | "ignored" | "xfailed" => TestStatus::Skipped,
            _ => TestStatus::Error,
        };
        if matches!(&caps["label"], "passed" | "failed") {
            qualifies = true;
        }
        totals.add(status, count);
    }
    qualifies.then_some(totals)
}

/// Infer a source file from names like `tests/test_calc.py::test_add`
#[must_use]
pub fn infer_source_file(name: &str) -> Option<String> {
    let (prefix, _) = name.split_once("::")?;
    let looks_like_path = prefix.contains('/')
        || prefix.contains('\\')
        || prefix
            .rsplit_once('.')
            .is_some_and(|(_, ext)| SOURCE_EXTENSIONS.contains(&ext));
    looks_like_path.then(|| prefix.to_string())
}

const SOURCE_EXTENSIONS: &[&str] = &[
    "py", "rs", "js", "jsx", "ts", "tsx", "rb", "go", "java", "kt", "cs", "php", "ex", "exs",
];

fn record_from(caps: &Captures<'_>, name: &str) -> Option<TestRecord> {
    let status = TestStatus::from_label(&caps["status"])?;
    Some(named(name, status))
}

fn named(name: &str, status: TestStatus) -> TestRecord {
    let record = TestRecord::new(name, status);
    match infer_source_file(name) {
        Some(path) => record.with_source_file(path),
        None => record,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn record(line: &str) -> TestRecord {
        match_record(line).unwrap_or_else(|| panic!("no record for {line:?}"))
    }

    #[test]
    fn test_cargo_lines() {
        let r = record("test tests::it_adds ... ok");
        assert_eq!(r.name, "tests::it_adds");
        assert_eq!(r.status, TestStatus::Passed);
        assert!(r.source_file.is_none());

        assert_eq!(record("test parser::rejects ... FAILED").status, TestStatus::Failed);
        assert_eq!(record("test slow_one ... ignored").status, TestStatus::Skipped);
        assert_eq!(
            record("test src/lib.rs - add (line 5) ... ok").name,
            "src/lib.rs - add (line 5)"
        );
    }

    #[test]
    fn test_go_lines() {
        let r = record("    --- FAIL: TestDivide (0.03s)");
        assert_eq!(r.name, "TestDivide");
        assert_eq!(r.status, TestStatus::Failed);
        assert_eq!(r.duration_ms, Some(30));
        assert_eq!(record("--- SKIP: TestNet").status, TestStatus::Skipped);
    }

    #[test]
    fn test_pytest_verbose_line() {
        let r = record("tests/test_calc.py::test_add PASSED                         [ 50%]");
        assert_eq!(r.name, "tests/test_calc.py::test_add");
        assert_eq!(r.status, TestStatus::Passed);
        assert_eq!(r.source_file.as_deref(), Some("tests/test_calc.py"));
    }

    #[test]
    fn test_generic_marker_with_colon_message() {
        let r = record("FAILED test_divide: ZeroDivisionError");
        assert_eq!(r.name, "test_divide");
        assert_eq!(r.status, TestStatus::Failed);
        assert_eq!(r.error_message.as_deref(), Some("ZeroDivisionError"));
    }

    #[test]
    fn test_generic_marker_with_dash_message() {
        let r = record("FAILED tests/test_x.py::test_a - AssertionError: boom");
        assert_eq!(r.name, "tests/test_x.py::test_a");
        assert_eq!(r.error_message.as_deref(), Some("AssertionError: boom"));
        assert_eq!(r.source_file.as_deref(), Some("tests/test_x.py"));
    }

    #[test]
    fn test_generic_marker_ignores_prose() {
        assert!(match_record("ERROR: something went wrong").is_none());
        assert!(match_record("error[E0425]: cannot find value").is_none());
    }

    #[test]
    fn test_unittest_lines() {
        let r = record("FAIL: test_div (tests.test_math.MathTest)");
        assert_eq!(r.name, "tests.test_math.MathTest.test_div");
        assert_eq!(r.status, TestStatus::Failed);

        let r = record("test_add (tests.test_math.MathTest) ... ok");
        assert_eq!(r.name, "tests.test_math.MathTest.test_add");
        assert_eq!(r.status, TestStatus::Passed);
    }

    #[test]
    fn test_symbol_lines() {
        let r = record("    ✓ adds numbers (3 ms)");
        assert_eq!(r.name, "adds numbers");
        assert_eq!(r.duration_ms, Some(3));
        assert_eq!(record("  ✕ divides by zero").status, TestStatus::Failed);
        assert_eq!(record("  ○ skipped later").status, TestStatus::Skipped);
    }

    #[test]
    fn test_summary_counts() {
        let totals = summary_counts("3 passed, 1 failed").expect("summary");
        assert_eq!(totals.passed, 3);
        assert_eq!(totals.failed, 1);

        let totals =
            summary_counts("test result: FAILED. 5 passed; 2 failed; 1 ignored; 0 measured")
                .expect("summary");
        assert_eq!(totals.total(), 8);
        assert_eq!(totals.skipped, 1);

        let totals = summary_counts("==== 1 failed, 2 passed, 1 error in 0.12s ====")
            .expect("summary");
        assert_eq!(totals.error, 1);
    }

    #[test]
    fn test_summary_rejects_non_summaries() {
        assert!(summary_counts("found 2 errors in config").is_none());
        assert!(summary_counts("Test Suites: 1 failed, 1 passed, 2 total").is_none());
    }

    #[test]
    fn test_match_line_prefers_records() {
        let line = "FAILED test_x - expected 3 passed";
        assert!(matches!(match_line(line), Some(LineMatch::Record(_))));
        assert!(matches!(match_line("2 passed in 0.1s"), Some(LineMatch::Counts(_))));
        assert!(match_line("collecting ...").is_none());
    }

    #[test]
    fn test_infer_source_file() {
        assert_eq!(infer_source_file("spec/models/user_spec.rb::valid").as_deref(), Some("spec/models/user_spec.rb"));
        assert_eq!(infer_source_file("test_calc.py::test_add").as_deref(), Some("test_calc.py"));
        assert_eq!(infer_source_file("tests::it_adds"), None);
        assert_eq!(infer_source_file("plain"), None);
    }
}
