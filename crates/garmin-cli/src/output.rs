//! Rendering of command results.
//!
//! Tables for rows read from the state tree, dotted `key value` listings for
//! single documents (the same ids the document would get in the tree), and
//! pretty JSON when `--format json` is requested.

use serde::Serialize;
use serde_json::Value;
use tabled::{Table, Tabled};

use garmin_core::error::AppError;
use garmin_core::result::AppResult;
use garmin_state::flatten::{FlatEntry, FlattenOptions, flatten};

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// Outcome shown in front of a one-line status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The command did what was asked.
    Done,
    /// Nothing failed, but the user has to act (MFA, missing session).
    Attention,
    /// The command failed. Printed on stderr.
    Failed,
}

/// Print a status line.
pub fn status(kind: Status, msg: &str) {
    match kind {
        Status::Done => println!("✓ {msg}"),
        Status::Attention => println!("⚠ {msg}"),
        Status::Failed => eprintln!("✗ {msg}"),
    }
}

/// Print rows as a table, or `empty` when there are none.
pub fn print_rows<T: Serialize + Tabled>(
    rows: &[T],
    empty: &str,
    format: OutputFormat,
) -> AppResult<()> {
    match format {
        OutputFormat::Table if rows.is_empty() => println!("{empty}"),
        OutputFormat::Table => println!("{}", Table::new(rows)),
        OutputFormat::Json => println!("{}", to_json(&rows)?),
    }
    Ok(())
}

/// Print one document under `root`.
pub fn print_document<T: Serialize>(root: &str, doc: &T, format: OutputFormat) -> AppResult<()> {
    match format {
        OutputFormat::Table => {
            for (id, value) in document_lines(root, &serde_json::to_value(doc)?) {
                field(&id, &value);
            }
        }
        OutputFormat::Json => println!("{}", to_json(doc)?),
    }
    Ok(())
}

/// Print one aligned `key value` line.
pub fn field(key: &str, value: &str) {
    println!("  {:<28} {}", format!("{key}:"), value);
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> AppResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| AppError::internal(format!("Failed to render JSON: {e}")))
}

/// Leaf ids and display values of `doc` as they would be laid out in the tree.
fn document_lines(root: &str, doc: &Value) -> Vec<(String, String)> {
    flatten(root, doc, &FlattenOptions::default())
        .into_iter()
        .filter_map(|entry| match entry {
            FlatEntry::Leaf { id, value, .. } => Some((id, display(&value))),
            FlatEntry::Object { .. } => None,
        })
        .collect()
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}
