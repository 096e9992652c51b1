//! Row annotation, list coercion and exact-duplicate removal.

use crate::output::Row;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Fill document-level defaults into `row`.
///
/// A default is applied when the row lacks the field or holds `null`; a
/// value the model supplied is never overwritten.
pub fn annotate_row(row: &mut Row, defaults: &[(String, Value)]) {
    for (field, value) in defaults {
        match row.get(field) {
            Some(v) if !v.is_null() => {}
            _ => {
                row.insert(field.clone(), value.clone());
            }
        }
    }
}

/// Collapse list-valued fields into one `", "`-joined string so every cell is
/// a scalar. Strings are joined bare, `null` elements become empty, anything
/// else in its JSON form.
pub fn normalize_rows(rows: &mut [Row]) {
    for row in rows.iter_mut() {
        for value in row.values_mut() {
            if let Value::Array(items) = value {
                let joined = items
                    .iter()
                    .map(list_item_text)
                    .collect::<Vec<_>>()
                    .join(", ");
                *value = Value::String(joined);
            }
        }
    }
}

fn list_item_text(item: &Value) -> String {
    match item {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Drop rows identical to an earlier row in every field, keeping first-seen
/// order. Returns the number removed.
///
/// An absent field and an explicit `null` compare equal; both end up as the
/// same empty cell.
pub fn dedup_rows(rows: &mut Vec<Row>) -> usize {
    let before = rows.len();
    let mut seen = HashSet::with_capacity(rows.len());
    rows.retain(|row| seen.insert(row_key(row)));
    before - rows.len()
}

/// Canonical identity of a row: its non-null fields in key order.
fn row_key(row: &Row) -> String {
    let present: BTreeMap<&String, &Value> = row.iter().filter(|(_, v)| !v.is_null()).collect();
    serde_json::to_string(&present).unwrap_or_default()
}

/// [`normalize_rows`] then [`dedup_rows`]. Idempotent: a second pass changes
/// nothing and removes nothing.
pub fn normalize_and_dedup(rows: &mut Vec<Row>) -> usize {
    normalize_rows(rows);
    dedup_rows(rows)
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

    fn defaults(pairs: &[(&str, &str)]) -> Vec<(String, Value)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    #[test]
    fn annotate_fills_missing_and_null() {
        let mut r = row(json!({"project_id": "12-345", "agency": null}));
        annotate_row(
            &mut r,
            &defaults(&[("agency", "NJTA"), ("asset_type", "Toll Road")]),
        );
        assert_eq!(r["agency"], json!("NJTA"));
        assert_eq!(r["asset_type"], json!("Toll Road"));
        assert_eq!(r["project_id"], json!("12-345"));
    }

    #[test]
    fn annotate_never_overrides() {
        let mut r = row(json!({"agency": "Port Authority", "source_url": ""}));
        annotate_row(
            &mut r,
            &defaults(&[("agency", "NJTA"), ("source_url", "https://x/doc.pdf")]),
        );
        assert_eq!(r["agency"], json!("Port Authority"));
        assert_eq!(r["source_url"], json!(""));
    }

    #[test]
    fn lists_become_joined_strings() {
        let mut rows = vec![row(json!({
            "key_personnel": ["Jane Roe", "John Doe"],
            "mixed": ["a", null, 3, true],
            "empty": [],
            "scalar": 5,
        }))];
        normalize_rows(&mut rows);
        assert_eq!(rows[0]["key_personnel"], json!("Jane Roe, John Doe"));
        assert_eq!(rows[0]["mixed"], json!("a, , 3, true"));
        assert_eq!(rows[0]["empty"], json!(""));
        assert_eq!(rows[0]["scalar"], json!(5));
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let mut rows = vec![
            row(json!({"a": 1, "b": "x"})),
            row(json!({"a": 2})),
            row(json!({"b": "x", "a": 1})),
            row(json!({"a": 1, "b": "y"})),
        ];
        assert_eq!(dedup_rows(&mut rows), 1);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], row(json!({"a": 1, "b": "x"})));
        assert_eq!(rows[1], row(json!({"a": 2})));
    }

    #[test]
    fn absent_equals_null() {
        let mut rows = vec![row(json!({"a": 1, "b": null})), row(json!({"a": 1}))];
        assert_eq!(dedup_rows(&mut rows), 1);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn distinct_values_survive() {
        let mut rows = vec![row(json!({"a": "1"})), row(json!({"a": 1}))];
        assert_eq!(dedup_rows(&mut rows), 0);
    }

    #[test]
    fn list_and_joined_string_dedup_after_normalising() {
        let mut rows = vec![
            row(json!({"names": ["A", "B"]})),
            row(json!({"names": "A, B"})),
        ];
        assert_eq!(normalize_and_dedup(&mut rows), 1);
        assert_eq!(rows, vec![row(json!({"names": "A, B"}))]);
    }

    #[test]
    fn normalize_and_dedup_is_idempotent() {
        let mut rows = vec![
            row(json!({"a": [1, 2], "b": null})),
            row(json!({"a": "1, 2"})),
            row(json!({"c": "z"})),
        ];
        normalize_and_dedup(&mut rows);
        let once = rows.clone();
        assert_eq!(normalize_and_dedup(&mut rows), 0);
        assert_eq!(rows, once);
    }
}
