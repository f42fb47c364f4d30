//! Pretty output formatting.

use cinesync_core::store::ChangeEvent;
use serde_json::Value;

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

/// Format a row for display, one column per line.
pub fn format_row(row: &Value) -> String {
    let Value::Object(map) = row else {
        return scalar(row);
    };
    let mut output = String::new();
    for (column, value) in map {
        let rendered = match value {
            Value::Object(_) => format!("{{{}}}", inline(value)),
            Value::Array(items) => format!("[{} rows]", items.len()),
            other => scalar(other),
        };
        output.push_str(&format!("  {column}: {rendered}\n"));
    }
    output
}

fn inline(value: &Value) -> String {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{k}: {}", scalar(v)))
            .collect::<Vec<_>>()
            .join(", "),
        other => scalar(other),
    }
}

/// Format rows for display.
pub fn format_rows(table: &str, rows: &[Value]) -> String {
    if rows.is_empty() {
        return format!("No rows in {table}.");
    }
    let mut output = format!("{} ({})\n", table.to_uppercase(), rows.len());
    output.push_str(&"-".repeat(40));
    for row in rows {
        output.push('\n');
        output.push_str(&format_row(row));
    }
    output
}

/// Format a change event as a single line.
pub fn format_change(event: &ChangeEvent, primary_key: Option<&str>) -> String {
    let at = event
        .commit_timestamp
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());
    let id = primary_key
        .and_then(|pk| event.affected_id(pk))
        .map(scalar)
        .unwrap_or_default();
    let row = event.new.as_ref().or(event.old.as_ref());
    let detail = match (id.is_empty(), row) {
        (true, Some(row)) => inline(row),
        (false, _) => format!("id {id}"),
        (true, None) => String::new(),
    };
    format!("[{at}] {} {} {detail}", event.kind.as_str(), event.table)
        .trim_end()
        .to_string()
}
