use std::fmt::Debug;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use super::{ChangeEvent, Filter, Query, Result, Select};

/// Primary key type shared by every table of the schema.
pub type RecordId = i64;

/// A row type that can live in a collection cache.
pub trait Record: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn id(&self) -> RecordId;
}

/// Row-level CRUD against the hosted database.
///
/// Rows cross this boundary as JSON; typing happens in the caller.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Runs a select and returns the matching rows in query order.
    async fn select(&self, query: &Query) -> Result<Vec<Value>>;

    /// Counts the rows matching the query's filters.
    async fn count(&self, query: &Query) -> Result<u64>;

    /// Inserts one row and returns it as stored, shaped by `returning`.
    async fn insert(&self, table: &str, row: Value, returning: &Select) -> Result<Value>;

    /// Applies `patch` to every matching row and returns the updated rows.
    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
        returning: &Select,
    ) -> Result<Vec<Value>>;

    /// Deletes every matching row.
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<()>;
}

/// Server-pushed row change notifications, one topic per table.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Subscribes to changes of `table`.
    async fn subscribe(&self, table: &str) -> Result<broadcast::Receiver<ChangeEvent>>;
}
