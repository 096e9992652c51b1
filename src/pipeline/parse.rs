//! Tolerant recovery of row objects from free-form model replies.
//!
//! Models are asked for a bare JSON array but routinely wrap it in prose or
//! code fences. We try the whole reply first, then the first bracketed
//! array of objects inside it. Anything else yields no rows; replies are
//! never repaired.

use crate::output::Row;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// First `[ { ... } ]` span, non-greedy so trailing prose is not swallowed.
static RE_OBJECT_ARRAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[\s*\{.*?\}\s*\]").unwrap());

/// Recover rows from a model reply. Never fails; unrecoverable text gives
/// an empty vector.
pub fn parse_rows(text: &str) -> Vec<Row> {
    if let Some(rows) = rows_from_json(text.trim()) {
        return rows;
    }
    if let Some(m) = RE_OBJECT_ARRAY.find(text) {
        if let Some(rows) = rows_from_json(m.as_str()) {
            return rows;
        }
    }
    debug!("No JSON rows recovered from {} chars of reply", text.len());
    Vec::new()
}

/// `Some` when `text` is a JSON array or object; non-object array elements
/// are dropped.
fn rows_from_json(text: &str) -> Option<Vec<Row>> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|v| match v {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
        ),
        Value::Object(map) => Some(vec![map]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> Row {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn plain_prose_yields_nothing() {
        assert!(parse_rows("not json at all").is_empty());
    }

    #[test]
    fn bare_array() {
        assert_eq!(parse_rows(r#"[{"a":1}]"#), vec![row(json!({"a": 1}))]);
    }

    #[test]
    fn array_wrapped_in_prose() {
        let reply = r#"Here are the rows: [{"a":1},{"a":2}] Thanks."#;
        assert_eq!(
            parse_rows(reply),
            vec![row(json!({"a": 1})), row(json!({"a": 2}))]
        );
    }

    #[test]
    fn array_inside_code_fence() {
        let reply = "```json\n[\n  {\"project_id\": \"12-345\"}\n]\n```";
        assert_eq!(parse_rows(reply), vec![row(json!({"project_id": "12-345"}))]);
    }

    #[test]
    fn malformed_array_is_not_repaired() {
        assert!(parse_rows(r#"[{"a": }]"#).is_empty());
    }

    #[test]
    fn empty_array_is_zero_rows() {
        assert!(parse_rows("[]").is_empty());
    }

    #[test]
    fn single_object_is_one_row() {
        assert_eq!(parse_rows(r#"{"a":"x"}"#), vec![row(json!({"a": "x"}))]);
    }

    #[test]
    fn non_object_elements_are_dropped() {
        assert_eq!(
            parse_rows(r#"[1, {"a":1}, "x", null]"#),
            vec![row(json!({"a": 1}))]
        );
    }

    #[test]
    fn scalars_and_junk_fall_through_to_search() {
        assert!(parse_rows("42").is_empty());
        assert_eq!(
            parse_rows(r#"true [{"a":1}]"#),
            vec![row(json!({"a": 1}))]
        );
    }

    #[test]
    fn first_array_wins() {
        let reply = r#"[{"a":1}] and later [{"b":2}]"#;
        assert_eq!(parse_rows(reply), vec![row(json!({"a": 1}))]);
    }
}
