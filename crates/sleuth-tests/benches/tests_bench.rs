// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

use criterion::{Criterion, criterion_group, criterion_main};
use sleuth_tests::{HeuristicParser, RawOutput, text};

fn cargo_transcript(tests: usize) -> String {
    let mut out = format!("running {tests} tests\n");
    for i in 0..tests {
        let verdict = if i % 17 == 0 { "FAILED" } else { "ok" };
        out.push_str(&format!("test module_{}::case_{i} ... {verdict}\n", i % 40));
    }
    let failed = tests.div_ceil(17);
    out.push_str(&format!(
        "\ntest result: FAILED. {} passed; {failed} failed; 0 ignored; 0 measured\n",
        tests - failed
    ));
    out
}

fn heuristic_benchmark(c: &mut Criterion) {
    let parser = HeuristicParser::new();
    let raw = RawOutput::from_capture("cargo test", cargo_transcript(2_000), "", 101);
    c.bench_function("heuristic_parse_2000_cargo_lines", |b| {
        b.iter(|| std::hint::black_box(parser.parse(std::hint::black_box(&raw))))
    });

    let summary_only = RawOutput::from_capture("pytest", "==== 5000 passed, 12 failed in 3.2s ====", "", 1);
    c.bench_function("heuristic_parse_summary_placeholders", |b| {
        b.iter(|| std::hint::black_box(parser.parse(std::hint::black_box(&summary_only))))
    });
}

fn truncation_benchmark(c: &mut Criterion) {
    let transcript = cargo_transcript(20_000);
    c.bench_function("truncate_middle_large_transcript", |b| {
        b.iter(|| {
            std::hint::black_box(text::truncate_middle(
                std::hint::black_box(&transcript),
                24_000,
                3_000,
                12_000,
            ))
        })
    });
}

criterion_group!(benches, heuristic_benchmark, truncation_benchmark);
criterion_main!(benches);
