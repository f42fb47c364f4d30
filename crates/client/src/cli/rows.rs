//! Row CLI commands.

use cinesync_core::store::{Filter, FilterOp};
use clap::{Parser, Subcommand};
use serde_json::Value;

/// Row commands.
#[derive(Debug, Parser)]
pub struct RowsCommand {
    #[command(subcommand)]
    pub action: RowsAction,
}

/// Available row actions.
#[derive(Debug, Subcommand)]
pub enum RowsAction {
    /// List rows of a table.
    List {
        /// Table name.
        table: String,
        /// Select expression, including embeds.
        #[arg(long, default_value = "*")]
        select: String,
        /// Filter as `column=op.value`; repeatable.
        #[arg(long = "where", value_name = "FILTER")]
        filters: Vec<String>,
        /// Order as `column.asc` or `column.desc`.
        #[arg(long)]
        order: Option<String>,
        /// Maximum number of rows.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Count rows of a table.
    Count {
        /// Table name.
        table: String,
        /// Filter as `column=op.value`; repeatable.
        #[arg(long = "where", value_name = "FILTER")]
        filters: Vec<String>,
    },
    /// Get one row by primary key.
    Get {
        /// Table name.
        table: String,
        /// Primary key column.
        #[arg(long)]
        key: String,
        /// Primary key value.
        id: i64,
    },
    /// Delete one row by primary key.
    Delete {
        /// Table name.
        table: String,
        /// Primary key column.
        #[arg(long)]
        key: String,
        /// Primary key value.
        id: i64,
    },
}

/// Parses a `column=op.value` argument into a filter.
pub fn parse_filter(arg: &str) -> Result<Filter, String> {
    let (column, expr) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected column=op.value, got {arg:?}"))?;
    let (op, raw) = expr
        .split_once('.')
        .ok_or_else(|| format!("expected op.value, got {expr:?}"))?;
    let op: FilterOp = op.parse()?;
    let value = match op {
        FilterOp::In => {
            let inner = raw.trim_start_matches('(').trim_end_matches(')');
            Value::Array(inner.split(',').map(parse_scalar).collect())
        }
        FilterOp::Is if raw == "null" => Value::Null,
        _ => parse_scalar(raw),
    };
    Ok(Filter::new(column.trim(), op, value))
}

fn parse_scalar(raw: &str) -> Value {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}
