use std::fmt;

use thiserror::Error;

/// Errors raised by a remote store or change feed implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// The backend refused the request. `message` is the backend's own text.
    #[error("{message}")]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Unknown table: {0}")]
    UnknownTable(String),
    #[error("Subscription failed: {0}")]
    Subscription(String),
}

impl StoreError {
    /// Builds a rejection without an HTTP status (used by in-process stores).
    pub fn rejected(message: impl Into<String>) -> Self {
        StoreError::Rejected {
            status: 400,
            code: None,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type for remote store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// A read of a collection failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct FetchError {
    pub table: String,
    pub message: String,
}

impl FetchError {
    pub fn new(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            message: message.into(),
        }
    }

    pub fn from_store(table: &str, err: &StoreError) -> Self {
        Self::new(table, err.to_string())
    }
}

/// The mutation a [`WriteError`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Create,
    Update,
    Delete,
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WriteOp::Create => "create",
            WriteOp::Update => "update",
            WriteOp::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// A create, update or delete was not confirmed by the remote store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct WriteError {
    pub table: String,
    pub op: WriteOp,
    pub message: String,
}

impl WriteError {
    pub fn new(table: impl Into<String>, op: WriteOp, message: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            op,
            message: message.into(),
        }
    }

    pub fn from_store(table: &str, op: WriteOp, err: &StoreError) -> Self {
        Self::new(table, op, err.to_string())
    }
}
