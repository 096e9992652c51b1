//! Tabular output: the final rows as CSV.
//!
//! Columns are the schema's fields in declaration order followed by any extra
//! fields the model emitted, in first-seen order. Cells are rendered as:
//! strings verbatim, `null`/absent as empty, numbers and booleans in JSON
//! form, nested objects as compact JSON.

use crate::error::ExtractError;
use crate::output::Row;
use crate::schema::SchemaVariant;
use csv::Writer;
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Header row for `rows` under `schema`.
pub fn columns(rows: &[Row], schema: SchemaVariant) -> Vec<String> {
    let mut cols: Vec<String> = schema.fields().iter().map(|f| f.to_string()).collect();
    for row in rows {
        for key in row.keys() {
            if !cols.iter().any(|c| c == key) {
                cols.push(key.clone());
            }
        }
    }
    cols
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn write_rows<W: Write>(writer: W, rows: &[Row], schema: SchemaVariant) -> Result<W, ExtractError> {
    let cols = columns(rows, schema);
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(&cols)?;
    for row in rows {
        wtr.write_record(cols.iter().map(|c| cell(row.get(c))))?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    wtr.into_inner()
        .map_err(|e| ExtractError::Csv(csv::Error::from(e.into_error())))
}

/// Render `rows` as a CSV document.
pub fn rows_to_csv_string(rows: &[Row], schema: SchemaVariant) -> Result<String, ExtractError> {
    let bytes = write_rows(Vec::new(), rows, schema)?;
    String::from_utf8(bytes).map_err(|e| ExtractError::Internal(format!("CSV not UTF-8: {e}")))
}

/// Write `rows` to `path` as CSV.
///
/// The file is written next to its destination and renamed into place, so a
/// failed run never leaves a partial file behind.
pub fn write_csv(path: &Path, rows: &[Row], schema: SchemaVariant) -> Result<(), ExtractError> {
    let write_failed = |source: std::io::Error| ExtractError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_failed)?;

    let tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_failed)?;
    let tmp = write_rows(tmp, rows, schema)?;
    tmp.persist(path).map_err(|e| write_failed(e.error))?;

    info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
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
    fn header_is_schema_then_extras() {
        let rows = vec![
            row(json!({"value": 1, "zeta": "z"})),
            row(json!({"alpha": "a", "zeta": "y"})),
        ];
        let cols = columns(&rows, SchemaVariant::FinancialFacts);
        assert_eq!(&cols[..11], crate::schema::FINANCIAL_FACT_FIELDS);
        assert_eq!(&cols[11..], &["zeta".to_string(), "alpha".to_string()]);
    }

    #[test]
    fn cells_render_by_type() {
        let rows = vec![row(json!({
            "asset": "Garden State Parkway",
            "value": 1234.5,
            "year": 2025,
            "segment": null,
            "source": "Table 3, \"Toll Revenue\"",
        }))];
        let csv = rows_to_csv_string(&rows, SchemaVariant::FinancialFacts).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "asset_type,asset,agency,as_at_date,year,period_reported,metric_type,segment,value,source,source_url"
        );
        assert_eq!(
            lines.next().unwrap(),
            ",Garden State Parkway,,,2025,,,,1234.5,\"Table 3, \"\"Toll Revenue\"\"\","
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn empty_rows_write_header_only() {
        let csv = rows_to_csv_string(&[], SchemaVariant::Procurement).unwrap();
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.starts_with("agency,opportunity_source_type,"));
    }

    #[test]
    fn write_csv_creates_parent_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("rows.csv");
        let rows = vec![row(json!({"agency": "NJTA", "contract_number": "T100.123"}))];
        write_csv(&path, &rows, SchemaVariant::Procurement).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.lines().nth(1).unwrap().starts_with("NJTA,,,T100.123,"));
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(leftovers.len(), 1);
    }
}
