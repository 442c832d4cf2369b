// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

use criterion::{Criterion, criterion_group, criterion_main};
use serde_json::json;
use sleuth::analyzer::analysis_from_reply;
use sleuth::parser::parsed_from_reply;
use sleuth::prompts::{
    AnalysisLimits, ParseContext, PromptLimits, build_analysis_prompt, build_parse_prompt,
};
use sleuth_git::{ChangeSet, ChangedFile, CommitSummary, FileStatus};
use sleuth_tests::{RawOutput, TestRecord, TestStatus};

fn pytest_transcript(tests: usize) -> String {
    let mut out = String::from("============================= test session starts ==============================\n");
    for i in 0..tests {
        let verdict = if i % 13 == 0 { "FAILED" } else { "PASSED" };
        out.push_str(&format!("tests/test_mod_{}.py::test_case_{i} {verdict}\n", i % 25));
    }
    out
}

fn change_set(files: usize) -> ChangeSet {
    let files = (0..files)
        .map(|i| {
            let diff: String = (0..60).map(|line| format!("+    value_{line} = compute({i})\n")).collect();
            ChangedFile::new(format!("src/module_{i}/handler.py"), FileStatus::Modified, diff)
        })
        .collect();
    let commits = (0..20)
        .map(|i| {
            CommitSummary::new(
                format!("{i:040x}"),
                "Dev",
                chrono::Utc::now(),
                &format!("Change handler {i}"),
            )
        })
        .collect();
    ChangeSet::new(files, commits)
}

fn prompt_benchmark(c: &mut Criterion) {
    let raw = RawOutput::from_capture("pytest -v", pytest_transcript(20_000), "warning: slow", 1);
    let limits = PromptLimits::default();
    let context = ParseContext {
        language: Some("python"),
        hints: Some("Fixtures live in tests/conftest.py"),
    };
    c.bench_function("build_parse_prompt_20000_lines", |b| {
        b.iter(|| std::hint::black_box(build_parse_prompt(std::hint::black_box(&raw), &context, &limits)))
    });

    let changes = change_set(200);
    let record = TestRecord::new("tests/test_module_7.py::test_handler", TestStatus::Failed)
        .with_error_message("AssertionError: expected 3, got 4");
    let analysis_limits = AnalysisLimits::default();
    c.bench_function("build_analysis_prompt_200_files", |b| {
        b.iter(|| {
            std::hint::black_box(build_analysis_prompt(
                std::hint::black_box(&record),
                Some(&changes),
                None,
                &analysis_limits,
            ))
        })
    });
}

fn reply_benchmark(c: &mut Criterion) {
    let tests: Vec<_> = (0..1_000)
        .map(|i| json!({"name": format!("test_{i}"), "status": if i % 9 == 0 { "failed" } else { "passed" }, "duration_ms": i}))
        .collect();
    let reply = json!({"tests": tests, "summary": {"total": 1_000}, "confidence": 0.9});
    let reply = reply.as_object().cloned().unwrap_or_default();
    c.bench_function("parsed_from_reply_1000_tests", |b| {
        b.iter(|| std::hint::black_box(parsed_from_reply(std::hint::black_box(&reply))))
    });

    let changes = change_set(20);
    let record = TestRecord::new("test_handler", TestStatus::Failed);
    let analysis = json!({
        "likely_cause": "handler returns stale value",
        "suspected_files": ["src/module_3/handler.py"],
        "suspected_commit": format!("{:040x}", 3),
        "confidence": 0.7
    });
    let analysis = analysis.as_object().cloned().unwrap_or_default();
    c.bench_function("analysis_from_reply_with_commit", |b| {
        b.iter(|| {
            std::hint::black_box(analysis_from_reply(&record, Some(&changes), std::hint::black_box(&analysis)))
        })
    });
}

criterion_group!(benches, prompt_benchmark, reply_benchmark);
criterion_main!(benches);
