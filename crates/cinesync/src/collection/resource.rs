use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use cinesync_core::cinema::ValidationError;
use cinesync_core::store::{self, Order, Query, Record, RemoteStore, Select, StoreError};

/// Describes how one table is mirrored: its row type, the query that
/// materializes it, and the hooks applied around writes.
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    type Record: Record;
    type Create: Serialize + Send + Sync + 'static;
    type Patch: Serialize + Send + Sync + 'static;

    const TABLE: &'static str;
    const PRIMARY_KEY: &'static str;

    /// Columns and embeds fetched for every row, also used as the
    /// representation returned by writes.
    fn select(&self) -> Select {
        Select::all()
    }

    fn order(&self) -> Vec<Order> {
        Vec::new()
    }

    /// Tables whose changes invalidate this collection.
    fn watched_tables(&self) -> Vec<&'static str> {
        vec![Self::TABLE]
    }

    fn query(&self) -> Query {
        self.order()
            .into_iter()
            .fold(Query::new(Self::TABLE).select(self.select()), Query::order_by)
    }

    /// Materializes the whole collection.
    async fn load(&self, store: &dyn RemoteStore) -> store::Result<Vec<Self::Record>> {
        let rows = store.select(&self.query()).await?;
        let mut records = decode_rows::<Self::Record>(rows)?;
        records.iter_mut().for_each(|record| self.annotate(record));
        Ok(records)
    }

    /// Validates a create payload and fills its defaults.
    fn prepare_create(&self, input: Self::Create) -> Result<Self::Create, ValidationError> {
        Ok(input)
    }

    fn prepare_patch(&self, patch: Self::Patch) -> Result<Self::Patch, ValidationError> {
        Ok(patch)
    }

    /// Recomputes locally derived fields of a record.
    fn annotate(&self, _record: &mut Self::Record) {}
}

pub fn decode_rows<T: Record>(rows: Vec<Value>) -> store::Result<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(StoreError::from))
        .collect()
}
