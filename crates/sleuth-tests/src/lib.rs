// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! sleuth-tests: Captured test output and structured results for sleuth
//!
//! This library crate holds the data model shared by every stage of a sleuth
//! run (raw capture, parsed records, status totals) together with the
//! deterministic heuristic parser used when no text-understanding service is
//! available.
//!
//! # Example
//!
//! ```
//! use sleuth_tests::{HeuristicParser, RawOutput};
//!
//! let raw = RawOutput::from_capture("cargo test", "test it_adds ... ok", "", 0);
//! let parsed = HeuristicParser::new().parse(&raw);
//! assert_eq!(parsed.totals().passed, 1);
//! assert!(parsed.all_passed());
//! ```

pub mod error;
pub mod heuristic;
pub mod libtest;
pub mod markers;
pub mod raw;
pub mod result;
pub mod text;

pub use error::TestsError;
pub use heuristic::{FALLBACK_CONFIDENCE, HeuristicParser, parse_heuristic};
pub use raw::{RawOutput, RunMetadata, STDERR_SEPARATOR};
pub use result::{
    ParseMethod, ParsedOutput, StatusTotals, TestRecord, TestStatus, TotalsDiscrepancy,
    clamp_confidence,
};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::TestsError;
    pub use crate::heuristic::{HeuristicParser, parse_heuristic};
    pub use crate::raw::RawOutput;
    pub use crate::result::{ParseMethod, ParsedOutput, StatusTotals, TestRecord, TestStatus};
}
