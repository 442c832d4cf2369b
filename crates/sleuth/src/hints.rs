// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Project hints file
//!
//! Free-form text (usually `HINTS.md` at the project root) placed verbatim
//! into parse and analysis prompts. A missing or blank file means no hints.

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

/// Load hints from `path`
///
/// Returns `None` when the file is missing, unreadable or blank. Read
/// failures other than a missing file are logged and otherwise ignored.
#[must_use]
pub fn load_hints(path: &Path) -> Option<Arc<str>> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no hints file");
            return None;
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read hints file; continuing without hints");
            return None;
        }
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        debug!(path = %path.display(), "hints file is blank");
        return None;
    }
    debug!(path = %path.display(), chars = trimmed.chars().count(), "loaded hints");
    Some(Arc::from(trimmed))
}
