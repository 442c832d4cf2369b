// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Root-cause hypotheses for failing tests
//!
//! Failing records are ranked, the top `max_analyzed` are sent to the text
//! service under a concurrency limit, and the rest are marked skipped. Every
//! failing test ends up with exactly one [`FailureAnalysis`], whatever goes
//! wrong along the way.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sleuth_git::{ChangeSet, best_score};
use sleuth_llm::{StructuredRequest, TextService};
use sleuth_tests::{TestRecord, TestStatus, clamp_confidence};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::StrategyError;
use crate::prompts::{
    ANALYSIS_TEMPERATURE, ANALYZER_SYSTEM_PROMPT, AnalysisLimits, analysis_schema,
    build_analysis_prompt,
};
use crate::structured::request_validated;

/// Default number of failures sent to the text service per run
pub const DEFAULT_MAX_ANALYZED: usize = 10;

/// Default number of outstanding analysis requests
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Confidence assumed when an analysis reply does not report one
pub const DEFAULT_ANALYSIS_CONFIDENCE: f64 = 0.5;

/// Longest heuristic cause line, in characters
const MAX_CAUSE_CHARS: usize = 200;

/// How an analysis was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMethod {
    /// Text-understanding service
    Llm,
    /// Derived directly from the error text
    Heuristic,
    /// Not analyzed
    Skipped,
}

impl fmt::Display for AnalysisMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AnalysisMethod::Llm => "llm",
            AnalysisMethod::Heuristic => "heuristic",
            AnalysisMethod::Skipped => "skipped",
        })
    }
}

/// Why a failure did not get a full analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// More failures than `max_analyzed`
    BudgetExceeded,
    /// The text service could not be reached
    ServiceUnavailable,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::BudgetExceeded => "budget_exceeded",
            SkipReason::ServiceUnavailable => "service_unavailable",
        })
    }
}

/// Root-cause hypothesis for one failing test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureAnalysis {
    /// Name of the failing test
    pub test_name: String,
    /// Short statement of the likely cause
    pub likely_cause: String,
    /// Files believed to be involved
    pub suspected_files: Vec<String>,
    /// Full hash of a commit in the change-set believed to be involved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspected_commit: Option<String>,
    /// Suggested fix
    pub suggested_fix: String,
    /// Longer reasoning behind the cause
    pub explanation: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// How this analysis was produced
    pub method: AnalysisMethod,
    /// Why the test was not fully analyzed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    /// Extra detail about a degraded analysis
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl FailureAnalysis {
    /// A cause taken straight from the error text
    #[must_use]
    pub fn heuristic(record: &TestRecord, skip_reason: Option<SkipReason>, note: Option<String>) -> Self {
        Self {
            test_name: record.name.clone(),
            likely_cause: heuristic_cause(record),
            suspected_files: Vec::new(),
            suspected_commit: None,
            suggested_fix: String::new(),
            explanation: String::new(),
            confidence: 0.0,
            method: AnalysisMethod::Heuristic,
            skip_reason,
            note,
        }
    }

    /// A failure left out by the analysis budget
    #[must_use]
    pub fn skipped(record: &TestRecord, reason: SkipReason) -> Self {
        Self {
            method: AnalysisMethod::Skipped,
            ..Self::heuristic(record, Some(reason), None)
        }
    }
}

/// First meaningful line of a record's error text, as a cause
#[must_use]
pub fn heuristic_cause(record: &TestRecord) -> String {
    let verb = if record.status == TestStatus::Error {
        "errored"
    } else {
        "failed"
    };
    match record.error_message.as_deref().and_then(meaningful_line) {
        Some(line) => {
            let line: String = line.chars().take(MAX_CAUSE_CHARS).collect();
            format!("Test {verb}: {line}")
        }
        None => format!("Test {verb} without captured error text"),
    }
}

/// Prefer a line naming an error or assertion, else the first real line
fn meaningful_line(text: &str) -> Option<&str> {
    const SIGNALS: &[&str] = &["error", "exception", "assert", "panicked", "expected", "fail"];

    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| l.chars().any(char::is_alphanumeric))
        .filter(|l| !l.starts_with("Traceback (most recent call last)"))
        .collect();
    lines
        .iter()
        .find(|l| {
            let lower = l.to_lowercase();
            SIGNALS.iter().any(|s| lower.contains(s))
        })
        .or_else(|| lines.first())
        .copied()
}

/// Produces [`FailureAnalysis`] values for failing records
#[derive(Debug, Clone)]
pub struct FailureAnalyzer {
    service: Arc<dyn TextService>,
    limits: AnalysisLimits,
    max_analyzed: usize,
    max_concurrency: usize,
}

impl FailureAnalyzer {
    /// Create an analyzer backed by `service`
    #[must_use]
    pub fn new(service: Arc<dyn TextService>) -> Self {
        Self {
            service,
            limits: AnalysisLimits::default(),
            max_analyzed: DEFAULT_MAX_ANALYZED,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Set the prompt limits
    #[must_use]
    pub fn with_limits(mut self, limits: AnalysisLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set how many failures may be sent to the service
    #[must_use]
    pub fn with_max_analyzed(mut self, max_analyzed: usize) -> Self {
        self.max_analyzed = max_analyzed;
        self
    }

    /// Set the number of outstanding requests; zero is treated as one
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Analyze one failing record
    ///
    /// Returns `None` only if `cancel` fires first.
    pub async fn analyze(
        &self,
        record: &TestRecord,
        changes: Option<&ChangeSet>,
        hints: Option<&str>,
        cancel: &CancellationToken,
    ) -> Option<FailureAnalysis> {
        if !self.probe(cancel).await? {
            return Some(FailureAnalysis::heuristic(
                record,
                Some(SkipReason::ServiceUnavailable),
                None,
            ));
        }
        analyze_one(self.service.as_ref(), record, changes, hints, &self.limits, cancel).await
    }

    /// Analyze every failing record, keyed by test name
    ///
    /// Records that are not failed or errored are ignored. Records cut by
    /// the budget are marked skipped without any request. Analyses cut short
    /// by `cancel` are left out; everything finished before it is kept.
    #[instrument(skip_all, fields(records = records.len(), max_analyzed = self.max_analyzed))]
    pub async fn analyze_all(
        &self,
        records: &[TestRecord],
        changes: Option<Arc<ChangeSet>>,
        hints: Option<Arc<str>>,
        cancel: &CancellationToken,
    ) -> BTreeMap<String, FailureAnalysis> {
        let mut analyses = BTreeMap::new();
        let failing = unique_failing(records);
        if failing.is_empty() {
            return analyses;
        }

        let ranked = rank_for_budget(&failing, changes.as_deref());
        let (selected, over_budget) = ranked.split_at(self.max_analyzed.min(ranked.len()));
        for record in over_budget {
            analyses.insert(
                record.name.clone(),
                FailureAnalysis::skipped(record, SkipReason::BudgetExceeded),
            );
        }
        if !over_budget.is_empty() {
            info!(
                analyzed = selected.len(),
                skipped = over_budget.len(),
                "failure count exceeds analysis budget"
            );
        }
        if selected.is_empty() {
            return analyses;
        }

        match self.probe(cancel).await {
            None => return analyses,
            Some(false) => {
                info!(service = self.service.name(), "text service unavailable; heuristic analyses");
                for record in selected {
                    analyses.insert(
                        record.name.clone(),
                        FailureAnalysis::heuristic(record, Some(SkipReason::ServiceUnavailable), None),
                    );
                }
                return analyses;
            }
            Some(true) => {}
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut handles = Vec::with_capacity(selected.len());
        for record in selected {
            let record = (*record).clone();
            let service = Arc::clone(&self.service);
            let changes = changes.clone();
            let hints = hints.clone();
            let limits = self.limits;
            let cancel = cancel.clone();
            let semaphore = Arc::clone(&semaphore);
            let name = record.name.clone();

            let handle = tokio::spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return None,
                    permit = semaphore.acquire_owned() => permit.ok()?,
                };
                analyze_one(
                    service.as_ref(),
                    &record,
                    changes.as_deref(),
                    hints.as_deref(),
                    &limits,
                    &cancel,
                )
                .await
            });
            handles.push((name, handle));
        }

        for (name, handle) in handles {
            match handle.await {
                Ok(Some(analysis)) => {
                    analyses.insert(name, analysis);
                }
                Ok(None) => debug!(test = %name, "analysis cancelled"),
                Err(err) if cancel.is_cancelled() => {
                    debug!(test = %name, error = %err, "analysis task ended during cancellation");
                }
                Err(err) => {
                    warn!(test = %name, error = %err, "analysis task failed");
                    if let Some(record) = failing.iter().find(|r| r.name == name) {
                        analyses.insert(
                            name,
                            FailureAnalysis::heuristic(
                                record,
                                None,
                                Some(format!("analysis task failed: {err}")),
                            ),
                        );
                    }
                }
            }
        }

        analyses
    }

    /// Availability probe; `None` when cancelled
    async fn probe(&self, cancel: &CancellationToken) -> Option<bool> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            available = self.service.is_available() => Some(available),
        }
    }
}

/// Analyze one record with an already-probed service
async fn analyze_one(
    service: &dyn TextService,
    record: &TestRecord,
    changes: Option<&ChangeSet>,
    hints: Option<&str>,
    limits: &AnalysisLimits,
    cancel: &CancellationToken,
) -> Option<FailureAnalysis> {
    let prompt = build_analysis_prompt(record, changes, hints, limits);
    let request = StructuredRequest::new(prompt, analysis_schema())
        .with_system(ANALYZER_SYSTEM_PROMPT)
        .with_temperature(ANALYSIS_TEMPERATURE);

    let outcome = request_validated(service, request, cancel, |reply| {
        analysis_from_reply(record, changes, reply)
    })
    .await;

    let analysis = match outcome {
        Ok(analysis) => analysis,
        Err(StrategyError::Cancelled) => return None,
        Err(StrategyError::Service(err)) if err.is_transport() => {
            warn!(test = %record.name, error = %err, "text service failed during analysis");
            FailureAnalysis::heuristic(record, Some(SkipReason::ServiceUnavailable), None)
        }
        Err(err) => {
            warn!(test = %record.name, error = %err, "analysis reply unusable");
            FailureAnalysis::heuristic(
                record,
                None,
                Some("analysis response was malformed".to_string()),
            )
        }
    };

    debug!(
        test = %record.name,
        method = %analysis.method,
        confidence = analysis.confidence,
        "failure analyzed"
    );
    Some(analysis)
}

/// Validate an analysis reply
///
/// # Errors
///
/// Returns a description of the problem when `likely_cause` is missing or
/// empty.
pub fn analysis_from_reply(
    record: &TestRecord,
    changes: Option<&ChangeSet>,
    reply: &Map<String, Value>,
) -> Result<FailureAnalysis, String> {
    let text = |key: &str| {
        reply
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    };

    let likely_cause = text("likely_cause");
    if likely_cause.is_empty() {
        return Err("missing \"likely_cause\"".to_string());
    }

    let mut suspected_files: Vec<String> = Vec::new();
    let listed = reply
        .get("suspected_files")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str);
    let single = reply.get("suspected_file").and_then(Value::as_str);
    for path in listed.chain(single).map(str::trim) {
        if !path.is_empty() && !suspected_files.iter().any(|p| p == path) {
            suspected_files.push(path.to_string());
        }
    }

    let suspected_commit = reply
        .get("suspected_commit")
        .and_then(Value::as_str)
        .and_then(|prefix| {
            let resolved = changes.and_then(|c| c.resolve_commit(prefix));
            if resolved.is_none() {
                debug!(test = %record.name, commit = prefix, "suspected commit not in change-set; dropped");
            }
            resolved
        })
        .map(|commit| commit.hash.clone());

    let confidence = reply
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(DEFAULT_ANALYSIS_CONFIDENCE);

    Ok(FailureAnalysis {
        test_name: record.name.clone(),
        likely_cause,
        suspected_files,
        suspected_commit,
        suggested_fix: text("suggested_fix"),
        explanation: text("explanation"),
        confidence: clamp_confidence(confidence),
        method: AnalysisMethod::Llm,
        skip_reason: None,
        note: None,
    })
}

/// Failing records, first occurrence per name
fn unique_failing(records: &[TestRecord]) -> Vec<&TestRecord> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| r.is_failing())
        .filter(|r| seen.insert(r.name.as_str()))
        .collect()
}

/// Order failures for the analysis budget
///
/// Highest changed-file relevance first, then records with error text,
/// then original order.
fn rank_for_budget<'a>(failing: &[&'a TestRecord], changes: Option<&ChangeSet>) -> Vec<&'a TestRecord> {
    let mut keyed: Vec<(usize, bool, usize, &'a TestRecord)> = failing
        .iter()
        .enumerate()
        .map(|(idx, record)| {
            let relevance = changes.map_or(0, |c| {
                best_score(c, &record.name, record.source_file.as_deref())
            });
            (relevance, record.error_message.is_some(), idx, *record)
        })
        .collect();
    keyed.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));
    keyed.into_iter().map(|(_, _, _, record)| record).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use similar_asserts::assert_eq;
    use async_trait::async_trait;
    use sleuth_git::{ChangedFile, CommitSummary, FileStatus};
    use sleuth_llm::{ScriptedService, ServiceError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const HASH: &str = "1945ab9c752534e733c38ba0109dc3b741f0a6eb";

    fn failed(name: &str) -> TestRecord {
        TestRecord::new(name, TestStatus::Failed).with_error_message(format!(
            "Traceback (most recent call last):\n  File \"x.py\", line 3\nAssertionError: {name} broke"
        ))
    }

    fn changes() -> ChangeSet {
        ChangeSet::new(
            vec![ChangedFile::new("src/calc.py", FileStatus::Modified, "+ return a // b")],
            vec![CommitSummary::new(HASH, "Ada", Utc::now(), "calc: floor division")],
        )
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn good_reply() -> String {
        json!({
            "likely_cause": "divide now uses floor division",
            "suspected_files": ["src/calc.py"],
            "suspected_file": "src/calc.py",
            "suspected_commit": "1945AB9",
            "suggested_fix": "restore true division",
            "confidence": 0.8
        })
        .to_string()
    }

    #[test]
    fn test_heuristic_cause_picks_error_line() {
        let record = failed("test_divide");
        assert_eq!(heuristic_cause(&record), "Test failed: AssertionError: test_divide broke");
        let bare = TestRecord::new("t", TestStatus::Error);
        assert_eq!(heuristic_cause(&bare), "Test errored without captured error text");
        let plain = TestRecord::new("t", TestStatus::Failed).with_error_message("----\nvalues differ\n");
        assert_eq!(heuristic_cause(&plain), "Test failed: values differ");
    }

    #[test]
    fn test_reply_resolves_commit_and_dedupes_files() {
        let analysis = analysis_from_reply(&failed("test_divide"), Some(&changes()), &object(serde_json::from_str(&good_reply()).expect("json")))
            .expect("valid");
        assert_eq!(analysis.method, AnalysisMethod::Llm);
        assert_eq!(analysis.suspected_files, vec!["src/calc.py".to_string()]);
        assert_eq!(analysis.suspected_commit.as_deref(), Some(HASH));
        assert_eq!(analysis.confidence, 0.8);
    }

    #[test]
    fn test_reply_unknown_commit_dropped_and_default_confidence() {
        let reply = object(json!({"likely_cause": "x", "suspected_commit": "deadbeef00"}));
        let analysis = analysis_from_reply(&failed("t"), Some(&changes()), &reply).expect("valid");
        assert!(analysis.suspected_commit.is_none());
        assert_eq!(analysis.confidence, DEFAULT_ANALYSIS_CONFIDENCE);
        let analysis = analysis_from_reply(&failed("t"), None, &object(json!({"likely_cause": "x", "suspected_commit": HASH}))).expect("valid");
        assert!(analysis.suspected_commit.is_none());
    }

    #[test]
    fn test_reply_without_cause_rejected() {
        assert!(analysis_from_reply(&failed("t"), None, &object(json!({"likely_cause": " "}))).is_err());
        assert!(analysis_from_reply(&failed("t"), None, &object(json!({}))).is_err());
    }

    #[test]
    fn test_budget_ranking_prefers_relevance_then_error_text() {
        let records = [
            TestRecord::new("test_misc_no_text", TestStatus::Failed),
            failed("test_misc_with_text"),
            failed("tests/test_calc.py::test_divide"),
        ];
        let refs: Vec<&TestRecord> = records.iter().collect();
        let changes = changes();
        let ranked = rank_for_budget(&refs, Some(&changes));
        let names: Vec<&str> = ranked.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "tests/test_calc.py::test_divide",
                "test_misc_with_text",
                "test_misc_no_text"
            ]
        );
    }

    #[test]
    fn test_unique_failing_dedupes_and_filters() {
        let records = vec![
            failed("a"),
            TestRecord::new("b", TestStatus::Passed),
            TestRecord::new("a", TestStatus::Error),
            TestRecord::new("c", TestStatus::Error),
        ];
        let names: Vec<&str> = unique_failing(&records).iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_analyze_single_llm() {
        let service = Arc::new(ScriptedService::replies([good_reply()]));
        let analyzer = FailureAnalyzer::new(service.clone());
        let analysis = analyzer
            .analyze(&failed("test_divide"), Some(&changes()), Some("calc is pure"), &CancellationToken::new())
            .await
            .expect("not cancelled");
        assert_eq!(analysis.method, AnalysisMethod::Llm);
        let requests = service.requests();
        assert!(requests[0].prompt.contains("calc is pure"));
        assert_eq!(requests[0].temperature, ANALYSIS_TEMPERATURE);
    }

    #[tokio::test]
    async fn test_analyze_unavailable_is_heuristic() {
        let analyzer = FailureAnalyzer::new(Arc::new(ScriptedService::unavailable()));
        let analysis = analyzer
            .analyze(&failed("test_divide"), None, None, &CancellationToken::new())
            .await
            .expect("not cancelled");
        assert_eq!(analysis.method, AnalysisMethod::Heuristic);
        assert_eq!(analysis.skip_reason, Some(SkipReason::ServiceUnavailable));
        assert_eq!(analysis.confidence, 0.0);
        assert!(analysis.suspected_files.is_empty());
        assert!(analysis.likely_cause.contains("AssertionError"));
    }

    #[tokio::test]
    async fn test_malformed_twice_is_heuristic_with_note() {
        let service = Arc::new(ScriptedService::replies(["{}", "{\"cause\": 1}"]));
        let analyzer = FailureAnalyzer::new(service);
        let analysis = analyzer
            .analyze(&failed("t"), None, None, &CancellationToken::new())
            .await
            .expect("not cancelled");
        assert_eq!(analysis.method, AnalysisMethod::Heuristic);
        assert!(analysis.skip_reason.is_none());
        assert_eq!(analysis.note.as_deref(), Some("analysis response was malformed"));
    }

    #[tokio::test]
    async fn test_timeout_is_service_unavailable() {
        let service = Arc::new(ScriptedService::new([Err(ServiceError::Timeout { timeout_ms: 5 })]));
        let analysis = FailureAnalyzer::new(service)
            .analyze(&failed("t"), None, None, &CancellationToken::new())
            .await
            .expect("not cancelled");
        assert_eq!(analysis.skip_reason, Some(SkipReason::ServiceUnavailable));
    }

    #[tokio::test]
    async fn test_analyze_all_one_bad_record_does_not_affect_others() {
        let service = Arc::new(ScriptedService::from_fn(|request| {
            if request.prompt.contains("test_bad") {
                Ok("no json at all".to_string())
            } else {
                Ok(json!({"likely_cause": "fine"}).to_string())
            }
        }));
        let records = vec![failed("test_good_one"), failed("test_bad"), failed("test_good_two")];
        let analyses = FailureAnalyzer::new(service)
            .analyze_all(&records, None, None, &CancellationToken::new())
            .await;
        assert_eq!(analyses.len(), 3);
        assert_eq!(analyses["test_bad"].method, AnalysisMethod::Heuristic);
        assert_eq!(analyses["test_good_one"].method, AnalysisMethod::Llm);
        assert_eq!(analyses["test_good_two"].method, AnalysisMethod::Llm);
    }

    #[tokio::test]
    async fn test_analyze_all_zero_budget_skips_everything() {
        let service = Arc::new(ScriptedService::replies([good_reply()]));
        let analyses = FailureAnalyzer::new(service.clone())
            .with_max_analyzed(0)
            .analyze_all(&[failed("a"), failed("b")], None, None, &CancellationToken::new())
            .await;
        assert!(analyses.values().all(|a| a.method == AnalysisMethod::Skipped));
        assert_eq!(service.request_count(), 0);
    }

    #[tokio::test]
    async fn test_analyze_all_cancelled_produces_nothing_new() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let service = Arc::new(ScriptedService::from_fn(|_| Ok(json!({"likely_cause": "x"}).to_string())));
        let analyses = FailureAnalyzer::new(service.clone())
            .with_max_analyzed(1)
            .analyze_all(&[failed("a"), failed("b")], None, None, &cancel)
            .await;
        // Budget skips need no work and are kept; the analyzed slot is dropped
        assert_eq!(analyses.len(), 1);
        assert_eq!(analyses["b"].method, AnalysisMethod::Skipped);
        assert_eq!(service.request_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_response_then_valid_is_llm() {
        let service = Arc::new(ScriptedService::new([
            Err(ServiceError::invalid("envelope missing response")),
            Ok(good_reply()),
        ]));
        let analysis = FailureAnalyzer::new(service.clone())
            .analyze(&failed("test_divide"), Some(&changes()), None, &CancellationToken::new())
            .await
            .expect("not cancelled");
        assert_eq!(analysis.method, AnalysisMethod::Llm);
        assert_eq!(service.request_count(), 2);
    }

    /// Tracks how many `generate_structured` calls are in flight
    #[derive(Debug, Default)]
    struct SlowService {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextService for SlowService {
        fn name(&self) -> &str {
            "slow"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn generate_structured(
            &self,
            _request: &StructuredRequest,
        ) -> Result<String, ServiceError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(json!({"likely_cause": "slow but fine"}).to_string())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_analyze_all_respects_concurrency_limit() {
        let service = Arc::new(SlowService::default());
        let records: Vec<TestRecord> = (0..20).map(|i| failed(&format!("test_case_{i:02}"))).collect();
        let analyses = FailureAnalyzer::new(service.clone())
            .with_max_analyzed(20)
            .with_max_concurrency(3)
            .analyze_all(&records, None, None, &CancellationToken::new())
            .await;

        assert_eq!(analyses.len(), 20);
        assert!(analyses.values().all(|a| a.method == AnalysisMethod::Llm));
        assert_eq!(service.calls.load(Ordering::SeqCst), 20);
        let peak = service.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in-flight calls {peak} exceeded limit");
        assert!(peak >= 1);
    }

    #[test]
    fn test_analysis_json_shape() {
        let analysis = FailureAnalysis::skipped(&failed("t"), SkipReason::BudgetExceeded);
        let json = serde_json::to_value(&analysis).expect("serialize");
        assert_eq!(json["method"], "skipped");
        assert_eq!(json["skip_reason"], "budget_exceeded");
        assert!(json.get("suspected_commit").is_none());
    }
}
