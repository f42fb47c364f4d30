//! Output formatting functions.

pub mod pretty;

use cinesync_core::store::ChangeEvent;
use serde_json::{json, Value};

use crate::cli::OutputFormat;

fn compact(value: &impl serde::Serialize) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

pub fn format_rows(table: &str, rows: &[Value], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => compact(&rows),
        OutputFormat::Pretty => pretty::format_rows(table, rows),
    }
}

pub fn format_row(row: &Value, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => compact(row),
        OutputFormat::Pretty => pretty::format_row(row).trim_end().to_string(),
    }
}

pub fn format_count(table: &str, count: u64, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => compact(&json!({"table": table, "count": count})),
        OutputFormat::Pretty => format!("{table}: {count} rows"),
    }
}

/// JSON output is one document per line so it can be piped.
pub fn format_change(event: &ChangeEvent, primary_key: Option<&str>, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => compact(event),
        OutputFormat::Pretty => pretty::format_change(event, primary_key),
    }
}
