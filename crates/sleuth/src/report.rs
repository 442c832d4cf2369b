// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Report rendering for the terminal and for machines

use std::fmt::Write as _;

use serde::Serialize;
use sleuth_tests::{ParsedOutput, TestRecord, TestStatus};

use crate::analyzer::{AnalysisMethod, FailureAnalysis};
use crate::error::RunError;
use crate::orchestrator::RunResult;

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    result: &'a RunResult,
    exit_code: i32,
}

/// Serialize a run as pretty-printed JSON
///
/// # Errors
///
/// Returns a `serde_json::Error` if serialization fails.
pub fn render_json(result: &RunResult) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&JsonReport {
        result,
        exit_code: result.exit_code(),
    })
}

/// Render a run for the terminal
#[must_use]
pub fn render_text(result: &RunResult) -> String {
    let mut out = String::new();
    let raw = &result.raw;

    let _ = writeln!(out, "Run {}", result.run_id);
    let _ = write!(
        out,
        "Command: {} (exit {}, {} ms",
        raw.command, raw.exit_code, raw.duration_ms
    );
    if raw.timed_out {
        out.push_str(", timed out");
    }
    out.push_str(")\n");

    write_parsed(&mut out, &result.parsed);

    let failing: Vec<&TestRecord> = result.parsed.failing_records().collect();
    if !failing.is_empty() {
        out.push_str("\nFailures:\n");
        let missing = if result.cancelled {
            "not analyzed (run cancelled)"
        } else {
            "not analyzed (analysis not requested)"
        };
        let mut seen = std::collections::BTreeSet::new();
        for record in failing {
            if !seen.insert(record.name.as_str()) {
                continue;
            }
            match result.analyses.get(&record.name) {
                Some(analysis) => write_analysis(&mut out, analysis),
                None => {
                    let _ = writeln!(out, "  {}\n    {missing}", record.name);
                }
            }
        }
    }

    if result.cancelled {
        out.push_str("\nRun cancelled; results above are partial.\n");
    }
    out
}

/// Render an execution failure and any partial parse
#[must_use]
pub fn render_error(error: &RunError) -> String {
    let mut out = format!("error: {error}\n");
    if let RunError::Execution {
        parsed: Some(parsed),
        ..
    } = error
    {
        if !parsed.records().is_empty() {
            out.push_str("\nOutput captured before the failure:\n");
            write_parsed(&mut out, parsed);
        }
    }
    out
}

fn write_parsed(out: &mut String, parsed: &ParsedOutput) {
    let totals = parsed.totals();
    let _ = writeln!(
        out,
        "Parsed with {} (confidence {:.2})",
        method_label(parsed),
        parsed.parse_confidence()
    );
    let _ = writeln!(
        out,
        "Totals: {} passed, {} failed, {} skipped, {} error, {} unknown ({} total)",
        totals.passed,
        totals.failed,
        totals.skipped,
        totals.error,
        totals.unknown,
        totals.total()
    );
    if let Some(discrepancy) = parsed.discrepancy() {
        let _ = writeln!(
            out,
            "Warning: output reported {} tests but {} were found",
            discrepancy.reported_total, discrepancy.record_count
        );
    }
    if parsed.records().is_empty() {
        return;
    }

    out.push_str("\nTests:\n");
    for record in parsed.records() {
        let _ = write!(out, "  {:<7} {}", status_label(record.status), record.name);
        if let Some(ms) = record.duration_ms {
            let _ = write!(out, " ({ms} ms)");
        }
        out.push('\n');
    }
}

fn write_analysis(out: &mut String, analysis: &FailureAnalysis) {
    let _ = write!(out, "  {}  [{}", analysis.test_name, analysis.method);
    if analysis.method == AnalysisMethod::Llm {
        let _ = write!(out, ", confidence {:.2}", analysis.confidence);
    }
    if let Some(reason) = analysis.skip_reason {
        let _ = write!(out, ", {reason}");
    }
    out.push_str("]\n");

    if analysis.method == AnalysisMethod::Skipped {
        return;
    }
    let _ = writeln!(out, "    cause: {}", analysis.likely_cause);
    if !analysis.suspected_files.is_empty() {
        let _ = writeln!(out, "    files: {}", analysis.suspected_files.join(", "));
    }
    if let Some(commit) = &analysis.suspected_commit {
        let short: String = commit.chars().take(7).collect();
        let _ = writeln!(out, "    commit: {short}");
    }
    if !analysis.suggested_fix.is_empty() {
        let _ = writeln!(out, "    fix: {}", analysis.suggested_fix);
    }
    if let Some(note) = &analysis.note {
        let _ = writeln!(out, "    note: {note}");
    }
}

fn method_label(parsed: &ParsedOutput) -> &'static str {
    match parsed.parse_method() {
        sleuth_tests::ParseMethod::Llm => "llm",
        sleuth_tests::ParseMethod::Fallback => "fallback",
    }
}

fn status_label(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Passed => "PASS",
        TestStatus::Failed => "FAIL",
        TestStatus::Skipped => "SKIP",
        TestStatus::Error => "ERROR",
        TestStatus::Unknown => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::SkipReason;
    use crate::error::ExecutionError;
    use similar_asserts::assert_eq;
    use sleuth_tests::{ParseMethod, RawOutput, TotalsDiscrepancy};
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn result_with(records: Vec<TestRecord>, analyses: Vec<FailureAnalysis>) -> RunResult {
        let raw = RawOutput::from_capture("pytest -v", "...", "", 1);
        RunResult {
            run_id: Uuid::nil(),
            started_at: raw.started_at,
            raw,
            parsed: ParsedOutput::new(records, ParseMethod::Llm, 0.9),
            analyses: analyses
                .into_iter()
                .map(|a| (a.test_name.clone(), a))
                .collect::<BTreeMap<_, _>>(),
            cancelled: false,
        }
    }

    #[test]
    fn test_text_report_lists_totals_and_analyses() {
        let failing = TestRecord::new("test_divide", TestStatus::Failed)
            .with_error_message("ZeroDivisionError: division by zero");
        let over_budget = TestRecord::new("test_other", TestStatus::Error);
        let analysis = FailureAnalysis {
            test_name: "test_divide".to_string(),
            likely_cause: "divide() no longer guards zero".to_string(),
            suspected_files: vec!["src/math.py".to_string()],
            suspected_commit: Some("1945ab9f00000000000000000000000000000000".to_string()),
            suggested_fix: "restore the zero check".to_string(),
            explanation: String::new(),
            confidence: 0.8,
            method: AnalysisMethod::Llm,
            skip_reason: None,
            note: None,
        };
        let skipped = FailureAnalysis::skipped(&over_budget, SkipReason::BudgetExceeded);
        let result = result_with(
            vec![
                TestRecord::new("test_add", TestStatus::Passed).with_duration_ms(3),
                failing,
                over_budget,
            ],
            vec![analysis, skipped],
        );

        let text = render_text(&result);
        assert!(text.contains("Command: pytest -v (exit 1,"));
        assert!(text.contains("Parsed with llm (confidence 0.90)"));
        assert!(text.contains("Totals: 1 passed, 1 failed, 0 skipped, 1 error, 0 unknown (3 total)"));
        assert!(text.contains("  PASS    test_add (3 ms)"));
        assert!(text.contains("test_divide  [llm, confidence 0.80]"));
        assert!(text.contains("    cause: divide() no longer guards zero"));
        assert!(text.contains("    commit: 1945ab9\n"));
        assert!(text.contains("test_other  [skipped, budget_exceeded]"));
    }

    #[test]
    fn test_text_report_flags_missing_analysis() {
        let mut result = result_with(vec![TestRecord::new("test_x", TestStatus::Failed)], vec![]);
        result.cancelled = true;
        let text = render_text(&result);
        assert!(text.contains("not analyzed (run cancelled)"));
        assert!(text.contains("Run cancelled"));
    }

    #[test]
    fn test_text_report_unrequested_analysis_not_called_cancelled() {
        let result = result_with(vec![TestRecord::new("test_x", TestStatus::Failed)], vec![]);
        let text = render_text(&result);
        assert!(text.contains("test_x\n    not analyzed (analysis not requested)"));
        assert!(!text.contains("cancelled"));
    }

    #[test]
    fn test_text_report_shows_discrepancy() {
        let mut result = result_with(vec![TestRecord::new("a", TestStatus::Passed)], vec![]);
        result.parsed = result.parsed.clone().with_discrepancy(TotalsDiscrepancy {
            reported_total: 4,
            record_count: 1,
        });
        assert!(render_text(&result).contains("output reported 4 tests but 1 were found"));
    }

    #[test]
    fn test_json_report_includes_exit_code() {
        let result = result_with(vec![TestRecord::new("a", TestStatus::Failed)], vec![]);
        let json: serde_json::Value =
            serde_json::from_str(&render_json(&result).expect("render")).expect("valid json");
        assert_eq!(json["exit_code"], 1);
        assert_eq!(json["parsed"]["totals"]["failed"], 1);
        assert_eq!(json["run_id"], Uuid::nil().to_string());
    }

    #[test]
    fn test_error_report_includes_partial_parse() {
        let raw = RawOutput::from_capture("pytset", "", "sh: 1: pytset: not found", 127);
        let parsed = ParsedOutput::new(
            vec![TestRecord::new("<run: pytset>", TestStatus::Unknown)],
            ParseMethod::Fallback,
            0.3,
        );
        let error = RunError::Execution {
            error: ExecutionError::CommandNotFound { raw: Box::new(raw) },
            parsed: Some(Box::new(parsed)),
        };
        let text = render_error(&error);
        assert!(text.starts_with("error: Command not found: pytset\n"));
        assert!(text.contains("UNKNOWN <run: pytset>"));
    }
}
