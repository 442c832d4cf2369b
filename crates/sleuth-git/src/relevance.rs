// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Lexical relevance of changed files to a failing test
//!
//! Scoring is cheap: names and paths are split into lower-case
//! word tokens and a file earns one point per token it shares with the test,
//! plus a bonus when it is the test's own source file.

use std::collections::BTreeSet;

use crate::change::{ChangeSet, ChangedFile};

/// Bonus for the file a test is defined in
pub const SOURCE_FILE_BONUS: usize = 3;

/// Tokens too generic to signal relevance
const STOP_TOKENS: &[&str] = &["test", "tests", "spec", "specs"];

/// Shortest token kept
const MIN_TOKEN_CHARS: usize = 3;

/// A changed file with its relevance score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankedFile<'a> {
    /// The changed file
    pub file: &'a ChangedFile,
    /// Relevance score, higher is more relevant
    pub score: usize,
}

/// Split a test name or path into lower-case word tokens
///
/// Splits on every non-alphanumeric character and on camelCase humps, then
/// drops generic words and tokens shorter than three characters.
///
/// ```
/// use sleuth_git::tokenize;
///
/// let tokens = tokenize("tests/test_calc.py::TestDivideByZero");
/// assert!(tokens.contains("calc"));
/// assert!(tokens.contains("divide"));
/// assert!(tokens.contains("zero"));
/// assert!(!tokens.contains("test"));
/// ```
#[must_use]
pub fn tokenize(text: &str) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    for word in text.split(|c: char| !c.is_alphanumeric()) {
        for part in split_camel(word) {
            let token = part.to_lowercase();
            if token.chars().count() >= MIN_TOKEN_CHARS && !STOP_TOKENS.contains(&token.as_str()) {
                tokens.insert(token);
            }
        }
    }
    tokens
}

/// Split `HTTPServerError` into `HTTP`, `Server`, `Error`
fn split_camel(word: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = word.char_indices().collect();
    let mut parts = Vec::new();
    let mut start = 0;
    for i in 1..chars.len() {
        let (idx, c) = chars[i];
        let prev = chars[i - 1].1;
        let next_lower = chars.get(i + 1).is_some_and(|(_, n)| n.is_lowercase());
        let boundary = c.is_uppercase()
            && (prev.is_lowercase() || prev.is_numeric() || (prev.is_uppercase() && next_lower));
        if boundary {
            parts.push(&word[start..idx]);
            start = idx;
        }
    }
    if start < word.len() {
        parts.push(&word[start..]);
    }
    parts
}

/// Score one changed file against a test's tokens
#[must_use]
pub fn score_file(
    file: &ChangedFile,
    test_tokens: &BTreeSet<String>,
    source_file: Option<&str>,
) -> usize {
    let shared = tokenize(&file.path).intersection(test_tokens).count();
    let bonus = if source_file.is_some_and(|s| s == file.path) {
        SOURCE_FILE_BONUS
    } else {
        0
    };
    shared + bonus
}

/// Rank changed files by relevance to a test, most relevant first
///
/// The sort is stable, so files with equal scores keep their diff order.
#[must_use]
pub fn rank_files<'a>(
    changes: &'a ChangeSet,
    test_name: &str,
    source_file: Option<&str>,
) -> Vec<RankedFile<'a>> {
    let mut test_tokens = tokenize(test_name);
    if let Some(source) = source_file {
        test_tokens.extend(tokenize(source));
    }

    let mut ranked: Vec<RankedFile<'a>> = changes
        .files
        .iter()
        .map(|file| RankedFile {
            file,
            score: score_file(file, &test_tokens, source_file),
        })
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

/// Highest relevance score of any changed file for a test (0 when none)
#[must_use]
pub fn best_score(changes: &ChangeSet, test_name: &str, source_file: Option<&str>) -> usize {
    rank_files(changes, test_name, source_file)
        .first()
        .map_or(0, |ranked| ranked.score)
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: tokens are lower-case, long enough and never stop words
        #[test]
        fn prop_tokens_normalized(text in "[A-Za-z0-9_/:. -]{0,60}") {
            for token in tokenize(&text) {
                prop_assert!(token.chars().count() >= MIN_TOKEN_CHARS);
                prop_assert_eq!(token.to_lowercase(), token.clone());
                prop_assert!(!STOP_TOKENS.contains(&token.as_str()));
            }
        }
    }
}
