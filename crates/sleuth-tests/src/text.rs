// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Char-boundary-safe slicing of captured output
//!
//! All limits here count Unicode scalar values, never bytes, so slicing can
//! not split a multi-byte character.

use std::borrow::Cow;

/// Number of characters in `text`
#[must_use]
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// The first `n` characters of `text`
#[must_use]
pub fn head(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// The last `n` characters of `text`
#[must_use]
pub fn tail(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    let len = char_len(text);
    if n >= len {
        return text;
    }
    match text.char_indices().nth(len - n) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

/// Marker inserted where the middle of a text was dropped
#[must_use]
pub fn omission_marker(omitted: usize) -> String {
    format!("\n[... {omitted} characters omitted ...]\n")
}

/// Fit `text` into `budget` characters, keeping its head and tail
///
/// Texts within budget are returned unchanged. Otherwise the last
/// `tail_chars` characters are kept first, then up to `head_chars` from the
/// start, joined by an [`omission_marker`]. The result never exceeds
/// `budget`. The full tail survives whenever `budget` leaves room for it
/// next to the marker.
#[must_use]
pub fn truncate_middle(text: &str, budget: usize, head_chars: usize, tail_chars: usize) -> Cow<'_, str> {
    let len = char_len(text);
    if len <= budget {
        return Cow::Borrowed(text);
    }

    // The marker for `len` omitted characters is the longest one possible
    let marker_room = char_len(&omission_marker(len));
    if budget <= marker_room {
        return Cow::Borrowed(tail(text, budget));
    }

    let room = budget - marker_room;
    let tail_keep = tail_chars.min(room);
    let head_keep = head_chars.min(room - tail_keep);
    let omitted = len - head_keep - tail_keep;

    Cow::Owned(format!(
        "{}{}{}",
        head(text, head_keep),
        omission_marker(omitted),
        tail(text, tail_keep)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn test_head_and_tail_respect_char_boundaries() {
        let text = "héllo wörld ✓";
        assert_eq!(head(text, 2), "hé");
        assert_eq!(tail(text, 3), "d ✓");
        assert_eq!(head(text, 100), text);
        assert_eq!(tail(text, 100), text);
        assert_eq!(tail(text, 0), "");
    }

    #[test]
    fn test_truncate_within_budget_is_unchanged() {
        let out = truncate_middle("short", 10, 2, 2);
        assert!(matches!(out, Cow::Borrowed("short")));
    }

    #[test]
    fn test_truncate_keeps_head_and_tail() {
        let text = format!("HEAD{}TAIL", "x".repeat(500));
        let out = truncate_middle(&text, 100, 4, 4);
        assert!(out.starts_with("HEAD"));
        assert!(out.ends_with("TAIL"));
        assert!(out.contains("characters omitted"));
        assert!(char_len(&out) <= 100);
    }

    #[test]
    fn test_truncate_tiny_budget_keeps_only_tail() {
        let text = "a".repeat(50) + "END";
        let out = truncate_middle(&text, 3, 10, 10);
        assert_eq!(out, "END");
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: truncation never exceeds the budget
        #[test]
        fn prop_truncate_within_budget(
            text in ".{0,400}",
            budget in 0usize..300,
            head_chars in 0usize..200,
            tail_chars in 0usize..200,
        ) {
            let out = truncate_middle(&text, budget, head_chars, tail_chars);
            prop_assert!(char_len(&out) <= budget);
        }

        /// Property: the requested tail survives when the budget leaves room for it
        #[test]
        fn prop_truncate_keeps_tail(
            text in ".{0,400}",
            tail_chars in 0usize..100,
            head_chars in 0usize..100,
        ) {
            let budget = tail_chars + head_chars + 64;
            let out = truncate_middle(&text, budget, head_chars, tail_chars);
            prop_assert!(out.ends_with(tail(&text, tail_chars)));
        }
    }
}
