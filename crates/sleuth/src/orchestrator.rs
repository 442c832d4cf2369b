// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Run orchestration
//!
//! Sequences execute, parse and analyze for one run. Each stage sees the
//! output of the one before it; a degraded stage never stops the next one.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use sleuth_git::ChangeSet;
use sleuth_llm::TextService;
use sleuth_tests::{ParsedOutput, RawOutput};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::analyzer::{FailureAnalysis, FailureAnalyzer};
use crate::config::Settings;
use crate::error::{ExecutionError, RunError};
use crate::executor::{ExecRequest, execute};
use crate::parser::OutputParser;

/// Exit code when nothing failed or errored
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code when at least one test failed or errored
pub const EXIT_TEST_FAILURES: i32 = 1;
/// Exit code for execution and configuration errors
pub const EXIT_EXECUTION_ERROR: i32 = 2;
/// Exit code after Ctrl-C
pub const EXIT_CANCELLED: i32 = 130;

/// Immutable collaborators shared by every stage of a run
#[derive(Debug, Clone)]
pub struct RunContext {
    parser: OutputParser,
    analyzer: FailureAnalyzer,
    hints: Option<Arc<str>>,
    changes: Option<Arc<ChangeSet>>,
}

impl RunContext {
    /// A context with default limits, no hints and no change-set
    #[must_use]
    pub fn new(service: Arc<dyn TextService>) -> Self {
        Self {
            parser: OutputParser::new(Arc::clone(&service)),
            analyzer: FailureAnalyzer::new(service),
            hints: None,
            changes: None,
        }
    }

    /// A context configured from `settings`
    #[must_use]
    pub fn from_settings(settings: &Settings, service: Arc<dyn TextService>) -> Self {
        Self {
            parser: OutputParser::new(Arc::clone(&service))
                .with_limits(settings.prompt_limits)
                .with_language(settings.language.clone()),
            analyzer: FailureAnalyzer::new(service)
                .with_limits(settings.analysis_limits)
                .with_max_analyzed(settings.max_analyzed)
                .with_max_concurrency(settings.max_concurrency),
            hints: None,
            changes: None,
        }
    }

    /// Attach project hints
    #[must_use]
    pub fn with_hints(mut self, hints: Option<Arc<str>>) -> Self {
        self.hints = hints;
        self
    }

    /// Attach the change-set for this run
    #[must_use]
    pub fn with_changes(mut self, changes: Option<ChangeSet>) -> Self {
        self.changes = changes.map(Arc::new);
        self
    }

    /// Replace the parser
    #[must_use]
    pub fn with_parser(mut self, parser: OutputParser) -> Self {
        self.parser = parser;
        self
    }

    /// Replace the analyzer
    #[must_use]
    pub fn with_analyzer(mut self, analyzer: FailureAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Project hints, if any
    #[must_use]
    pub fn hints(&self) -> Option<&str> {
        self.hints.as_deref()
    }

    /// Change-set, if any
    #[must_use]
    pub fn changes(&self) -> Option<&ChangeSet> {
        self.changes.as_deref()
    }
}

/// What to run
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Command, directory, environment and timeout
    pub exec: ExecRequest,
    /// Analyze failing tests after parsing
    pub analyze: bool,
}

impl RunRequest {
    /// Run `exec` and analyze any failures
    #[must_use]
    pub fn new(exec: ExecRequest) -> Self {
        Self {
            exec,
            analyze: true,
        }
    }

    /// The request described by `settings`
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            ExecRequest::new(&settings.command, &settings.cwd, settings.timeout)
                .with_envs(settings.environment.clone()),
        )
    }

    /// Stop after parsing
    #[must_use]
    pub fn without_analysis(mut self) -> Self {
        self.analyze = false;
        self
    }
}

/// Everything one run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// Unique id for this run
    pub run_id: Uuid,
    /// When the command was started
    pub started_at: DateTime<Utc>,
    /// The capture; only its metadata is serialized
    #[serde(rename = "run", serialize_with = "serialize_metadata")]
    pub raw: RawOutput,
    /// Structured records and totals
    pub parsed: ParsedOutput,
    /// Analyses keyed by test name
    pub analyses: BTreeMap<String, FailureAnalysis>,
    /// Whether the run was cancelled before analysis finished
    pub cancelled: bool,
}

impl RunResult {
    /// Process exit code for this result
    ///
    /// Zero when no test failed or errored, one otherwise. A cancelled run
    /// reports the conventional interrupt status.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.cancelled {
            EXIT_CANCELLED
        } else if self.parsed.totals().is_success() {
            EXIT_SUCCESS
        } else {
            EXIT_TEST_FAILURES
        }
    }

    /// Failing tests that have no analysis entry
    pub fn unanalyzed(&self) -> impl Iterator<Item = &str> {
        self.parsed
            .failing_records()
            .map(|r| r.name.as_str())
            .filter(|name| !self.analyses.contains_key(*name))
    }
}

fn serialize_metadata<S: Serializer>(raw: &RawOutput, serializer: S) -> Result<S::Ok, S::Error> {
    raw.metadata().serialize(serializer)
}

/// Sequences the pipeline stages
#[derive(Debug, Clone, Copy, Default)]
pub struct Orchestrator;

impl Orchestrator {
    /// Execute, parse and (optionally) analyze
    ///
    /// # Errors
    ///
    /// Returns `RunError::Execution` when the command could not be run (with
    /// a parse of anything it printed), or `RunError::Cancelled` when
    /// `cancel` fires before records exist.
    #[instrument(skip_all, fields(command = %request.exec.command))]
    pub async fn run(
        ctx: &RunContext,
        request: &RunRequest,
        cancel: &CancellationToken,
    ) -> Result<RunResult, RunError> {
        let raw = match execute(&request.exec, cancel).await {
            Ok(raw) => raw,
            Err(ExecutionError::Cancelled) => return Err(RunError::Cancelled),
            Err(error) => {
                warn!(error = %error, "test command could not be executed");
                let parsed = match error.captured() {
                    Some(raw) => ctx
                        .parser
                        .parse_until(raw, ctx.hints(), cancel)
                        .await
                        .map(Box::new),
                    None => None,
                };
                return Err(RunError::Execution { error, parsed });
            }
        };

        Self::interpret(ctx, raw, request.analyze, cancel).await
    }

    /// Parse and (optionally) analyze an existing capture
    ///
    /// # Errors
    ///
    /// Returns `RunError::Cancelled` when `cancel` fires during parsing.
    #[instrument(skip_all, fields(command = %raw.command, analyze))]
    pub async fn interpret(
        ctx: &RunContext,
        raw: RawOutput,
        analyze: bool,
        cancel: &CancellationToken,
    ) -> Result<RunResult, RunError> {
        let parsed = ctx
            .parser
            .parse_until(&raw, ctx.hints(), cancel)
            .await
            .ok_or(RunError::Cancelled)?;

        let analyses = if analyze && !parsed.all_passed() {
            ctx.analyzer
                .analyze_all(
                    parsed.records(),
                    ctx.changes.clone(),
                    ctx.hints.clone(),
                    cancel,
                )
                .await
        } else {
            BTreeMap::new()
        };

        let result = RunResult {
            run_id: Uuid::new_v4(),
            started_at: raw.started_at,
            raw,
            parsed,
            analyses,
            cancelled: cancel.is_cancelled(),
        };

        info!(
            run_id = %result.run_id,
            total = result.parsed.totals().total(),
            failed = result.parsed.totals().failed,
            error = result.parsed.totals().error,
            analyses = result.analyses.len(),
            cancelled = result.cancelled,
            "run complete"
        );
        Ok(result)
    }
}
