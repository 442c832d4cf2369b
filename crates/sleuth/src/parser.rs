// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Turning captured output into structured results
//!
//! [`OutputParser`] picks a [`ParseStrategy`] per call: the text-understanding
//! strategy when the service answers its probe, the heuristic strategy
//! otherwise. Any failure of the former falls through to the latter, so
//! parsing always yields a [`ParsedOutput`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sleuth_llm::{StructuredRequest, TextService};
use sleuth_tests::markers::infer_source_file;
use sleuth_tests::{
    HeuristicParser, ParseMethod, ParsedOutput, RawOutput, TestRecord, TestStatus,
    TotalsDiscrepancy,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::StrategyError;
use crate::prompts::{
    PARSE_TEMPERATURE, PARSER_SYSTEM_PROMPT, ParseContext, PromptLimits, build_parse_prompt,
    parse_schema,
};
use crate::structured::request_validated;

/// Confidence assumed when a structured reply does not report one
pub const DEFAULT_LLM_CONFIDENCE: f64 = 1.0;

/// One way of producing a [`ParsedOutput`]
#[async_trait]
pub trait ParseStrategy: Send + Sync {
    /// Method recorded on results from this strategy
    fn method(&self) -> ParseMethod;

    /// Parse one capture
    ///
    /// # Errors
    ///
    /// Returns a `StrategyError` when this strategy cannot produce a result;
    /// the caller then falls back.
    async fn parse(
        &self,
        raw: &RawOutput,
        context: &ParseContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<ParsedOutput, StrategyError>;
}

/// Deterministic marker scan
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicStrategy {
    parser: HeuristicParser,
}

impl HeuristicStrategy {
    /// Wrap a heuristic parser
    #[must_use]
    pub fn new(parser: HeuristicParser) -> Self {
        Self { parser }
    }

    /// Parse without going through the trait
    #[must_use]
    pub fn parse_now(&self, raw: &RawOutput) -> ParsedOutput {
        self.parser.parse(raw)
    }
}

#[async_trait]
impl ParseStrategy for HeuristicStrategy {
    fn method(&self) -> ParseMethod {
        ParseMethod::Fallback
    }

    async fn parse(
        &self,
        raw: &RawOutput,
        _context: &ParseContext<'_>,
        _cancel: &CancellationToken,
    ) -> Result<ParsedOutput, StrategyError> {
        Ok(self.parse_now(raw))
    }
}

/// Structured extraction through a text-understanding service
#[derive(Debug, Clone)]
pub struct LlmStrategy {
    service: Arc<dyn TextService>,
    limits: PromptLimits,
}

impl LlmStrategy {
    /// Create a strategy backed by `service`
    #[must_use]
    pub fn new(service: Arc<dyn TextService>, limits: PromptLimits) -> Self {
        Self { service, limits }
    }
}

#[async_trait]
impl ParseStrategy for LlmStrategy {
    fn method(&self) -> ParseMethod {
        ParseMethod::Llm
    }

    async fn parse(
        &self,
        raw: &RawOutput,
        context: &ParseContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<ParsedOutput, StrategyError> {
        let prompt = build_parse_prompt(raw, context, &self.limits);
        let request = StructuredRequest::new(prompt, parse_schema())
            .with_system(PARSER_SYSTEM_PROMPT)
            .with_temperature(PARSE_TEMPERATURE);
        request_validated(self.service.as_ref(), request, cancel, parsed_from_reply).await
    }
}

/// Converts raw captures into structured results
#[derive(Debug, Clone)]
pub struct OutputParser {
    service: Arc<dyn TextService>,
    limits: PromptLimits,
    heuristic: HeuristicStrategy,
    language: Option<String>,
}

impl OutputParser {
    /// Create a parser that prefers `service`
    #[must_use]
    pub fn new(service: Arc<dyn TextService>) -> Self {
        Self {
            service,
            limits: PromptLimits::default(),
            heuristic: HeuristicStrategy::default(),
            language: None,
        }
    }

    /// Set the prompt limits
    #[must_use]
    pub fn with_limits(mut self, limits: PromptLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the language hint placed in prompts
    #[must_use]
    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    /// Pick the strategy for this call
    async fn select_strategy(&self) -> Box<dyn ParseStrategy + '_> {
        if self.service.is_available().await {
            Box::new(LlmStrategy::new(Arc::clone(&self.service), self.limits))
        } else {
            info!(service = self.service.name(), "text service unavailable; using heuristic parse");
            Box::new(self.heuristic)
        }
    }

    /// Parse a capture, never failing
    pub async fn parse(&self, raw: &RawOutput, hints: Option<&str>) -> ParsedOutput {
        match self.parse_until(raw, hints, &CancellationToken::new()).await {
            Some(parsed) => parsed,
            None => self.heuristic.parse_now(raw),
        }
    }

    /// Parse a capture, or return `None` if `cancel` fires first
    #[instrument(skip_all, fields(command = %raw.command))]
    pub async fn parse_until(
        &self,
        raw: &RawOutput,
        hints: Option<&str>,
        cancel: &CancellationToken,
    ) -> Option<ParsedOutput> {
        if raw.is_blank() {
            debug!("blank output; nothing to parse");
            return Some(ParsedOutput::empty(ParseMethod::Fallback, 0.0));
        }

        let context = ParseContext {
            language: self.language.as_deref(),
            hints,
        };
        let strategy = self.select_strategy().await;
        let parsed = match strategy.parse(raw, &context, cancel).await {
            Ok(parsed) => parsed,
            Err(StrategyError::Cancelled) => return None,
            Err(err) => {
                warn!(
                    method = ?strategy.method(),
                    error = %err,
                    "parse strategy failed; falling back to heuristic"
                );
                self.heuristic.parse_now(raw)
            }
        };

        info!(
            method = ?parsed.parse_method(),
            confidence = parsed.parse_confidence(),
            records = parsed.records().len(),
            failed = parsed.totals().failed,
            "parsed test output"
        );
        Some(parsed)
    }
}

/// Validate a parse reply and turn it into a result set
///
/// # Errors
///
/// Returns a description of the first schema violation found.
pub fn parsed_from_reply(reply: &Map<String, Value>) -> Result<ParsedOutput, String> {
    let tests = reply
        .get("tests")
        .and_then(Value::as_array)
        .ok_or("missing \"tests\" array")?;

    let records = tests
        .iter()
        .enumerate()
        .map(|(idx, test)| record_from_reply(idx, test))
        .collect::<Result<Vec<_>, _>>()?;

    let confidence = reply
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(DEFAULT_LLM_CONFIDENCE);

    let mut parsed = ParsedOutput::new(records, ParseMethod::Llm, confidence);

    if let Some(summary) = reply.get("summary").and_then(Value::as_object) {
        if let Some(reported_total) = reported_total(summary) {
            if reported_total != parsed.records().len() {
                warn!(
                    reported_total,
                    record_count = parsed.records().len(),
                    "reported totals disagree with returned records"
                );
                let record_count = parsed.records().len();
                parsed = parsed.with_discrepancy(TotalsDiscrepancy {
                    reported_total,
                    record_count,
                });
            }
        }
        if let Some(ms) = summary.get("duration_ms").and_then(as_millis) {
            parsed = parsed.with_reported_duration_ms(ms);
        }
    }

    Ok(parsed)
}

fn record_from_reply(idx: usize, test: &Value) -> Result<TestRecord, String> {
    let test = test
        .as_object()
        .ok_or_else(|| format!("tests[{idx}] is not an object"))?;

    let name = test
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| format!("tests[{idx}] has no name"))?;

    let label = test
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| format!("tests[{idx}] has no status"))?;
    let status = TestStatus::from_label(label)
        .ok_or_else(|| format!("tests[{idx}].status {label:?} is not a known status"))?;

    let mut record = TestRecord::new(name, status);
    if let Some(ms) = test.get("duration_ms").and_then(as_millis) {
        record = record.with_duration_ms(ms);
    }
    if let Some(message) = test.get("error_message").and_then(Value::as_str) {
        record = record.with_error_message(message);
    }
    let file = test
        .get("file")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .or_else(|| infer_source_file(name));
    if let Some(file) = file {
        record = record.with_source_file(file);
    }
    Ok(record)
}

/// Total the summary claims, from `total` or the sum of its buckets
fn reported_total(summary: &Map<String, Value>) -> Option<usize> {
    let count = |key: &str| summary.get(key).and_then(Value::as_u64);
    let total = count("total").or_else(|| {
        let buckets: Vec<u64> = ["passed", "failed", "skipped", "error"]
            .iter()
            .filter_map(|k| count(*k))
            .collect();
        (!buckets.is_empty()).then(|| buckets.iter().sum())
    })?;
    usize::try_from(total).ok()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn as_millis(value: &Value) -> Option<u64> {
    let ms = value.as_f64()?;
    (ms.is_finite() && ms >= 0.0).then(|| ms.round() as u64)
}
