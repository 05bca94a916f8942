//! CSV report writers for describe results.
//!
//! Record lists coming back from the org are loosely shaped JSON; the header
//! is the union of every key seen, in first-seen order, so sparse records
//! still line up.

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Union of record keys in first-seen order. Salesforce pads query records
/// with an `attributes` envelope that carries no report value; skip it.
fn union_headers(records: &[Value]) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for record in records {
        if let Value::Object(map) = record {
            for key in map.keys() {
                if key == "attributes" {
                    continue;
                }
                if !headers.iter().any(|h| h == key) {
                    headers.push(key.clone());
                }
            }
        }
    }
    headers
}

/// One CSV cell from one JSON value. Nested structures are serialized as
/// JSON text rather than flattened.
fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Write a record list as CSV: one header row, one data row per record.
/// Returns the number of data rows written.
pub fn records_to_csv<W: Write>(writer: W, records: &[Value]) -> Result<usize> {
    let headers = union_headers(records);
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(&headers)?;

    let mut rows = 0;
    for record in records {
        let row: Vec<String> = headers
            .iter()
            .map(|h| cell_text(record.get(h)))
            .collect();
        csv_writer.write_record(&row)?;
        rows += 1;
    }
    csv_writer.flush()?;
    Ok(rows)
}

/// Write a record list to a CSV file, creating parent directories as needed.
pub fn write_records_csv(path: &Path, records: &[Value]) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file =
        fs::File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let rows = records_to_csv(file, records)?;
    tracing::info!("Wrote {} rows to {}", rows, path.display());
    Ok(path.to_path_buf())
}

const WORKBOOK_COLUMNS: &[&str] = &[
    "name",
    "label",
    "type",
    "length",
    "custom",
    "nillable",
    "updateable",
];

/// Field workbook for one sobject describe: one row per field with the
/// columns an admin reaches for first.
pub fn write_field_workbook(path: &Path, describe_body: &Value) -> Result<PathBuf> {
    let fields = describe_body
        .get("fields")
        .and_then(Value::as_array)
        .context("describe result has no fields array")?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file =
        fs::File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut csv_writer = csv::Writer::from_writer(file);
    csv_writer.write_record(WORKBOOK_COLUMNS)?;
    for field in fields {
        let row: Vec<String> = WORKBOOK_COLUMNS
            .iter()
            .map(|c| cell_text(field.get(*c)))
            .collect();
        csv_writer.write_record(&row)?;
    }
    csv_writer.flush()?;
    tracing::info!("Wrote field workbook to {}", path.display());
    Ok(path.to_path_buf())
}

/// Flattened row of a page-layout describe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutRow {
    pub section: String,
    pub label: String,
    pub field: String,
    pub required: bool,
}

/// Flatten a layout describe into one row per layout item carrying a field.
pub fn layout_rows(layout_body: &Value) -> Vec<LayoutRow> {
    let mut rows = Vec::new();
    let sections = layout_body
        .get("editLayoutSections")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for section in &sections {
        let heading = section
            .get("heading")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let layout_rows = section
            .get("layoutRows")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for layout_row in &layout_rows {
            let items = layout_row
                .get("layoutItems")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for item in &items {
                let field = item
                    .get("layoutComponents")
                    .and_then(Value::as_array)
                    .and_then(|comps| {
                        comps.iter().find_map(|c| {
                            (c.get("type").and_then(Value::as_str) == Some("Field"))
                                .then(|| c.get("value").and_then(Value::as_str))
                                .flatten()
                        })
                    });
                let Some(field) = field else { continue };
                rows.push(LayoutRow {
                    section: heading.to_string(),
                    label: item
                        .get("label")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    field: field.to_string(),
                    required: item
                        .get("required")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                });
            }
        }
    }
    rows
}

/// Write a layout describe as CSV.
pub fn write_layout_csv(path: &Path, layout_body: &Value) -> Result<PathBuf> {
    let rows = layout_rows(layout_body);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file =
        fs::File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut csv_writer = csv::Writer::from_writer(file);
    csv_writer.write_record(["section", "label", "field", "required"])?;
    for row in &rows {
        csv_writer.write_record([
            row.section.as_str(),
            row.label.as_str(),
            row.field.as_str(),
            if row.required { "true" } else { "false" },
        ])?;
    }
    csv_writer.flush()?;
    tracing::info!("Wrote layout describe to {}", path.display());
    Ok(path.to_path_buf())
}
