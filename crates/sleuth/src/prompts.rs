// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Prompt construction for parsing and failure analysis
//!
//! Every prompt is bounded. The fixed frame (instructions, context lines,
//! capped hints) always fits inside [`PROMPT_FRAME_RESERVE`] characters, and
//! the captured output is squeezed into whatever the cap leaves, keeping its
//! tail.

use std::fmt::Write as _;

use serde_json::{Value, json};
use sleuth_git::{ChangeSet, rank_files};
use sleuth_tests::text::{char_len, head, truncate_middle};
use sleuth_tests::{RawOutput, TestRecord};

/// Characters set aside for everything in a parse prompt except the output
pub const PROMPT_FRAME_RESERVE: usize = 4096;

/// Longest hints excerpt placed in any prompt
pub const MAX_HINT_CHARS: usize = 2000;

/// Longest command label placed in a parse prompt
pub const MAX_COMMAND_CHARS: usize = 200;

/// Longest language label placed in a parse prompt
const MAX_LANGUAGE_CHARS: usize = 100;

/// Sampling temperature for parsing
pub const PARSE_TEMPERATURE: f32 = 0.1;

/// Sampling temperature for failure analysis
pub const ANALYSIS_TEMPERATURE: f32 = 0.3;

/// System prompt for the output parser
pub const PARSER_SYSTEM_PROMPT: &str = "You are a test output parser. You read output from any \
test framework in any language (pytest, unittest, Jest, Mocha, Vitest, go test, JUnit, cargo \
test, RSpec and others) and extract structured results: each test's name, status \
(passed/failed/skipped/error), file path, duration and error message. Return ONLY valid JSON \
matching the schema provided.";

/// System prompt for the failure analyzer
pub const ANALYZER_SYSTEM_PROMPT: &str = "You are a software testing expert who analyzes test \
failures. Use the error text, recent code changes and recent commits to identify the most likely \
cause. Be specific and actionable: say what broke, which file or commit is suspicious, and how to \
fix it. Return ONLY valid JSON matching the schema provided.";

/// Size limits for the parse prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptLimits {
    /// Hard cap on the whole prompt, in characters
    pub max_prompt_chars: usize,
    /// Characters kept from the start of the output when it is cut
    pub head_chars: usize,
    /// Characters always kept from the end of the output
    pub tail_chars: usize,
}

impl Default for PromptLimits {
    fn default() -> Self {
        Self {
            max_prompt_chars: 32_000,
            head_chars: 6_000,
            tail_chars: 16_000,
        }
    }
}

impl PromptLimits {
    /// Whether the cap leaves room for the head, the tail and the frame
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.head_chars
            .checked_add(self.tail_chars)
            .and_then(|n| n.checked_add(PROMPT_FRAME_RESERVE))
            .is_some_and(|needed| self.max_prompt_chars >= needed)
    }
}

/// Size limits for the analysis prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisLimits {
    /// Changed files listed per failure
    pub max_files: usize,
    /// Diff characters shown per file
    pub per_file_diff_chars: usize,
    /// Diff characters shown across all files
    pub total_diff_chars: usize,
    /// Commit subjects listed
    pub max_commits: usize,
    /// Error text characters shown
    pub error_chars: usize,
}

impl Default for AnalysisLimits {
    fn default() -> Self {
        Self {
            max_files: 15,
            per_file_diff_chars: 2_000,
            total_diff_chars: 12_000,
            max_commits: 10,
            error_chars: 5_000,
        }
    }
}

/// Context lines for a parse prompt
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseContext<'a> {
    /// Language or framework hint
    pub language: Option<&'a str>,
    /// Free-text project hints
    pub hints: Option<&'a str>,
}

/// JSON shape the parser expects back
#[must_use]
pub fn parse_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "tests": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "file": {"type": ["string", "null"]},
                        "status": {"type": "string", "enum": ["passed", "failed", "skipped", "error"]},
                        "duration_ms": {"type": ["number", "null"]},
                        "error_message": {"type": ["string", "null"]}
                    },
                    "required": ["name", "status"]
                }
            },
            "summary": {
                "type": "object",
                "properties": {
                    "total": {"type": "integer"},
                    "passed": {"type": "integer"},
                    "failed": {"type": "integer"},
                    "skipped": {"type": "integer"},
                    "error": {"type": "integer"},
                    "duration_ms": {"type": "integer"}
                }
            },
            "confidence": {"type": "number", "minimum": 0, "maximum": 1}
        },
        "required": ["tests"]
    })
}

/// JSON shape the analyzer expects back
#[must_use]
pub fn analysis_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "likely_cause": {"type": "string"},
            "suspected_files": {"type": "array", "items": {"type": "string"}},
            "suspected_commit": {"type": ["string", "null"]},
            "suggested_fix": {"type": "string"},
            "explanation": {"type": "string"},
            "confidence": {"type": "number", "minimum": 0, "maximum": 1}
        },
        "required": ["likely_cause"]
    })
}

/// Build the parse prompt for one capture
///
/// The result never exceeds `limits.max_prompt_chars` when the limits are
/// consistent, and always ends its output block with the final
/// `limits.tail_chars` characters of the transcript.
#[must_use]
pub fn build_parse_prompt(raw: &RawOutput, context: &ParseContext<'_>, limits: &PromptLimits) -> String {
    let mut header = String::from("Parse the following test output and extract structured results.\n\nContext:\n");
    if !raw.command.trim().is_empty() {
        let _ = writeln!(header, "- Test command: `{}`", head(&raw.command, MAX_COMMAND_CHARS));
    }
    if let Some(language) = context.language.filter(|l| !l.trim().is_empty()) {
        let _ = writeln!(header, "- Language/Framework: {}", head(language, MAX_LANGUAGE_CHARS));
    }
    let _ = writeln!(header, "- Exit code: {}", raw.exit_code);
    if raw.timed_out {
        header.push_str("- The run was killed after exceeding its timeout; output may be incomplete.\n");
    }
    if let Some(hints) = context.hints.filter(|h| !h.trim().is_empty()) {
        let _ = write!(header, "\n## Project Hints\n{}\n", head(hints, MAX_HINT_CHARS));
    }
    header.push_str("\nOUTPUT:\n```\n");

    let footer = "\n```\n\nExtract ALL individual test results. For each test give name (full \
identifier), file (if identifiable), status (passed, failed, skipped or error), duration_ms (if \
printed) and error_message (for failures, null otherwise). Also give a summary with total, \
passed, failed, skipped, error and duration_ms as printed by the framework, and a confidence \
between 0 and 1 for how sure you are of the extraction.\n\nRespond with JSON of this shape:\n\
{\"tests\": [{\"name\": \"...\", \"file\": \"...\", \"status\": \"passed\", \"duration_ms\": 0, \
\"error_message\": null}], \"summary\": {\"total\": 0, \"passed\": 0, \"failed\": 0, \"skipped\": \
0, \"error\": 0, \"duration_ms\": 0}, \"confidence\": 0.9}";

    let frame = char_len(&header) + char_len(footer);
    let budget = limits.max_prompt_chars.saturating_sub(frame);
    let transcript = raw.transcript();
    let output = truncate_middle(&transcript, budget, limits.head_chars, limits.tail_chars);

    format!("{header}{output}{footer}")
}

/// Instruction appended when a reply must be retried
#[must_use]
pub fn corrective_prompt(original: &str, problem: &str) -> String {
    format!(
        "{original}\n\nYour previous reply was rejected: {}. Reply again with a single JSON \
object that follows the requested shape exactly.",
        head(problem, 300)
    )
}

/// Build the analysis prompt for one failing record
#[must_use]
pub fn build_analysis_prompt(
    record: &TestRecord,
    changes: Option<&ChangeSet>,
    hints: Option<&str>,
    limits: &AnalysisLimits,
) -> String {
    let mut prompt = String::from("Analyze the following test failure and identify the root cause.\n\n");
    let _ = writeln!(prompt, "## Failing Test\nTest: {}", record.name);
    let _ = writeln!(prompt, "Status: {}", record.status);
    let _ = writeln!(
        prompt,
        "File: {}",
        record.source_file.as_deref().unwrap_or("unknown")
    );

    let error = record.error_message.as_deref().unwrap_or("(no error text captured)");
    let error_tail = limits.error_chars / 2;
    let error = truncate_middle(error, limits.error_chars, limits.error_chars - error_tail, error_tail);
    let _ = write!(prompt, "\n## Error Message\n```\n{error}\n```\n");

    if let Some(changes) = changes.filter(|c| !c.is_empty()) {
        push_changes(&mut prompt, record, changes, limits);
    }

    if let Some(hints) = hints.filter(|h| !h.trim().is_empty()) {
        let _ = write!(prompt, "\n## Project Hints\n{}\n", head(hints, MAX_HINT_CHARS));
    }

    prompt.push_str(
        "\n## Task\nIdentify the most likely cause of this failure from the error text, the \
changed files and the recent commits. Respond with JSON of this shape:\n{\"likely_cause\": \
\"brief description\", \"suspected_files\": [\"path/to/file\"], \"suspected_commit\": \"hash or \
null\", \"suggested_fix\": \"specific steps\", \"explanation\": \"why this is the cause\", \
\"confidence\": 0.75}",
    );
    prompt
}

fn push_changes(prompt: &mut String, record: &TestRecord, changes: &ChangeSet, limits: &AnalysisLimits) {
    let ranked = rank_files(changes, &record.name, record.source_file.as_deref());
    if !ranked.is_empty() {
        prompt.push_str("\n## Recently Changed Files (most relevant first)\n");
    }
    let mut diff_room = limits.total_diff_chars;
    for entry in ranked.iter().take(limits.max_files) {
        let file = entry.file;
        let _ = writeln!(prompt, "- {} ({})", file.path, file.status);
        let allowance = limits.per_file_diff_chars.min(diff_room);
        if allowance == 0 || file.diff.trim().is_empty() {
            continue;
        }
        let shown = head(&file.diff, allowance);
        diff_room -= char_len(shown);
        let _ = writeln!(prompt, "```diff\n{shown}");
        if shown.len() < file.diff.len() {
            prompt.push_str("[... diff truncated ...]\n");
        }
        prompt.push_str("```\n");
    }

    if !changes.commits.is_empty() && limits.max_commits > 0 {
        prompt.push_str("\n## Recent Commits\n");
        for commit in changes.commits.iter().take(limits.max_commits) {
            let _ = writeln!(
                prompt,
                "- [{}] {} ({})",
                commit.short_hash(),
                commit.subject,
                commit.author
            );
        }
    }
}
