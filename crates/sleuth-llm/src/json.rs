// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Locating the JSON object inside a model reply
//!
//! Models wrap JSON in markdown fences or surround it with prose even when
//! asked not to. [`extract_json`] finds the first balanced top-level object
//! that actually parses.

use serde_json::{Map, Value};

use crate::error::ServiceError;

/// The first balanced `{...}` in `text` that parses as JSON
///
/// ```
/// use sleuth_llm::extract_json;
///
/// let reply = "Sure! ```json\n{\"tests\": []}\n```";
/// assert_eq!(extract_json(reply), Some("{\"tests\": []}"));
/// assert_eq!(extract_json("no json here"), None);
/// ```
#[must_use]
pub fn extract_json(text: &str) -> Option<&str> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_end(&text[start..]) {
            let candidate = &text[start..start + end];
            if serde_json::from_str::<Value>(candidate).is_ok() {
                return Some(candidate);
            }
        }
        search_from = start + 1;
    }
    None
}

/// Extract and parse the reply's JSON object
///
/// # Errors
///
/// Returns `ServiceError::InvalidResponse` when the reply holds no JSON
/// object.
pub fn parse_object(text: &str) -> Result<Map<String, Value>, ServiceError> {
    let json = extract_json(text).ok_or_else(|| ServiceError::invalid("reply contains no JSON object"))?;
    match serde_json::from_str(json) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ServiceError::invalid("reply JSON is not an object")),
        Err(e) => Err(ServiceError::invalid(e.to_string())),
    }
}

/// Byte length of the balanced object starting at `text[0] == '{'`
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn test_plain_object() {
        assert_eq!(extract_json(r#"{"a": 1}"#), Some(r#"{"a": 1}"#));
    }

    #[test]
    fn test_fenced_object_with_prose() {
        let reply = "Here is the result:\n```json\n{\"tests\": [{\"name\": \"x\"}]}\n```\nDone.";
        assert_eq!(extract_json(reply), Some("{\"tests\": [{\"name\": \"x\"}]}"));
    }

    #[test]
    fn test_braces_inside_strings() {
        let reply = r#"{"error_message": "expected '}' got '{'", "n": 2}"#;
        assert_eq!(extract_json(reply), Some(reply));
    }

    #[test]
    fn test_escaped_quotes() {
        let reply = r#"{"msg": "say \"hi\" {", "ok": true} trailing"#;
        assert_eq!(extract_json(reply), Some(r#"{"msg": "say \"hi\" {", "ok": true}"#));
    }

    #[test]
    fn test_skips_unparseable_braces() {
        let reply = "use {braces} then {\"a\": [1, 2]}";
        assert_eq!(extract_json(reply), Some("{\"a\": [1, 2]}"));
    }

    #[test]
    fn test_unbalanced_is_none() {
        assert_eq!(extract_json("{\"a\": 1"), None);
        assert_eq!(extract_json(""), None);
    }

    #[test]
    fn test_parse_object() {
        let map = parse_object("```\n{\"likely_cause\": \"x\"}\n```").expect("object");
        assert_eq!(map["likely_cause"], "x");
        assert!(matches!(
            parse_object("[1, 2]"),
            Err(ServiceError::InvalidResponse { .. })
        ));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: a serialized object survives arbitrary surrounding prose
        #[test]
        fn prop_object_found_in_prose(
            before in "[^{}\"]{0,40}",
            after in "\\PC{0,40}",
            key in "[a-z_]{1,10}",
            value in "\\PC{0,20}",
        ) {
            let mut map = Map::new();
            map.insert(key.clone(), Value::String(value.clone()));
            let object = Value::Object(map).to_string();
            let reply = format!("{before}{object}{after}");
            let found = extract_json(&reply).expect("object present");
            let parsed: Value = serde_json::from_str(found).expect("valid json");
            prop_assert_eq!(&parsed[key.as_str()], &Value::String(value));
        }

        /// Property: extraction never panics and always returns valid JSON
        #[test]
        fn prop_extract_is_valid_json(text in "\\PC{0,200}") {
            if let Some(found) = extract_json(&text) {
                prop_assert!(serde_json::from_str::<Value>(found).is_ok());
            }
        }
    }
}
