use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of row change pushed by the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Delete => "DELETE",
        }
    }
}

/// A row-level change notification for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    /// Row before the change (updates and deletes; may only carry the key).
    pub old: Option<Value>,
    /// Row after the change (inserts and updates).
    pub new: Option<Value>,
    pub commit_timestamp: Option<DateTime<Utc>>,
}

impl ChangeEvent {
    pub fn insert(table: impl Into<String>, new: Value) -> Self {
        Self {
            table: table.into(),
            kind: ChangeKind::Insert,
            old: None,
            new: Some(new),
            commit_timestamp: Some(Utc::now()),
        }
    }

    pub fn update(table: impl Into<String>, old: Value, new: Value) -> Self {
        Self {
            table: table.into(),
            kind: ChangeKind::Update,
            old: Some(old),
            new: Some(new),
            commit_timestamp: Some(Utc::now()),
        }
    }

    pub fn delete(table: impl Into<String>, old: Value) -> Self {
        Self {
            table: table.into(),
            kind: ChangeKind::Delete,
            old: Some(old),
            new: None,
            commit_timestamp: Some(Utc::now()),
        }
    }

    /// Primary key of the affected row, read from the new row first and
    /// the old row otherwise.
    pub fn affected_id(&self, primary_key: &str) -> Option<&Value> {
        self.new
            .as_ref()
            .and_then(|row| row.get(primary_key))
            .or_else(|| self.old.as_ref().and_then(|row| row.get(primary_key)))
            .filter(|id| !id.is_null())
    }
}
