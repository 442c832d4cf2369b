// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! sleuth: framework-agnostic test output interpretation and failure triage
//!
//! Runs a project's test command, turns whatever it printed into structured
//! per-test records, and produces a root-cause hypothesis for each failing
//! test using recent version-control changes as context. A text
//! understanding service is used when one is reachable; deterministic
//! heuristics take over when it is not.

#![warn(missing_docs)]

//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use sleuth::prelude::*;
//! use sleuth_llm::DisabledService;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() {
//! let ctx = RunContext::new(Arc::new(DisabledService));
//! let request = RunRequest::new(ExecRequest::new("cargo test", ".", Duration::from_secs(300)));
//! let result = Orchestrator::run(&ctx, &request, &CancellationToken::new())
//!     .await
//!     .expect("run");
//! println!("{}", sleuth::report::render_text(&result));
//! # }
//! ```

pub mod analyzer;
pub mod app;
pub mod config;
pub mod error;
pub mod executor;
pub mod hints;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod report;
pub mod structured;

pub use analyzer::{AnalysisMethod, FailureAnalysis, FailureAnalyzer, SkipReason};
pub use config::{Config, ConfigError, FileConfig, LlmProvider, Settings};
pub use error::{ExecutionError, RunError, StrategyError};
pub use executor::{ExecRequest, execute};
pub use orchestrator::{Orchestrator, RunContext, RunRequest, RunResult};
pub use parser::{HeuristicStrategy, LlmStrategy, OutputParser, ParseStrategy};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::analyzer::{AnalysisMethod, FailureAnalysis, FailureAnalyzer, SkipReason};
    pub use crate::error::{ExecutionError, RunError};
    pub use crate::executor::{ExecRequest, execute};
    pub use crate::orchestrator::{Orchestrator, RunContext, RunRequest, RunResult};
    pub use crate::parser::OutputParser;
}
