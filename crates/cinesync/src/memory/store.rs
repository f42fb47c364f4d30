//! In-memory remote store.
//!
//! Rows are kept as JSON per table, in insertion order. Reads run the same
//! query model the REST client renders: embeds are resolved first, then
//! filters, ordering, limit and column projection. Every write publishes
//! the matching change event on the attached [`MemoryFeed`].

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use cinesync_core::store::{
    compare_values, sort_rows, ChangeEvent, Filter, Query, RecordId, Relation, RemoteStore,
    Result, Select, StoreError,
};

use super::MemoryFeed;

#[derive(Debug)]
struct Table {
    primary_key: String,
    rows: Vec<Value>,
    next_id: RecordId,
}

impl Table {
    fn new(primary_key: &str) -> Self {
        Self {
            primary_key: primary_key.to_string(),
            rows: Vec::new(),
            next_id: 1,
        }
    }

    fn contains(&self, id: RecordId) -> bool {
        self.rows
            .iter()
            .any(|row| row.get(&self.primary_key).and_then(Value::as_i64) == Some(id))
    }
}

type Tables = HashMap<String, Table>;

/// In-memory storage backend for tests and demo mode.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    feed: MemoryFeed,
    failure: Arc<Mutex<Option<String>>>,
    selects: Arc<Mutex<HashMap<String, u64>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store with its own change feed.
    pub fn new() -> Self {
        Self::with_feed(MemoryFeed::new())
    }

    pub fn with_feed(feed: MemoryFeed) -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
            feed,
            failure: Arc::new(Mutex::new(None)),
            selects: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The feed every write is published on.
    pub fn feed(&self) -> &MemoryFeed {
        &self.feed
    }

    /// Declares a table and its integer primary key.
    pub async fn register_table(&self, table: &str, primary_key: &str) {
        let mut tables = self.tables.write().await;
        tables
            .entry(table.to_string())
            .or_insert_with(|| Table::new(primary_key));
    }

    /// Loads rows without publishing change events.
    pub async fn seed(&self, table: &str, rows: Vec<Value>) -> Result<()> {
        let mut tables = self.tables.write().await;
        let target = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        for row in rows {
            let id = row
                .get(&target.primary_key)
                .and_then(Value::as_i64)
                .ok_or_else(|| {
                    StoreError::rejected(format!(
                        "seed row for {table} is missing {}",
                        target.primary_key
                    ))
                })?;
            target.next_id = target.next_id.max(id + 1);
            target.rows.push(row);
        }
        Ok(())
    }

    /// Makes every following call fail with `message` until [`Self::recover`].
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(message.into());
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Number of selects served for `table` so far.
    pub fn select_count(&self, table: &str) -> u64 {
        self.selects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(table)
            .copied()
            .unwrap_or(0)
    }

    fn check_failure(&self) -> Result<()> {
        match self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(message) => Err(StoreError::rejected(message.clone())),
            None => Ok(()),
        }
    }

    fn record_select(&self, table: &str) {
        *self
            .selects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(table.to_string())
            .or_insert(0) += 1;
    }
}

fn same_key(a: &Value, b: &Value) -> bool {
    compare_values(a, b) == Some(Ordering::Equal)
}

/// Adds every embed of `select` to `row` under its alias.
fn resolve_row(tables: &Tables, table: &str, row: &Value, select: &Select) -> Value {
    let mut resolved = row.clone();
    if select.embeds.is_empty() || !resolved.is_object() {
        return resolved;
    }
    let own_key = tables
        .get(table)
        .and_then(|t| row.get(&t.primary_key))
        .filter(|v| !v.is_null());

    if let Value::Object(fields) = &mut resolved {
        for embed in &select.embeds {
            let Some(target) = tables.get(&embed.table) else {
                fields.insert(embed.alias.clone(), Value::Null);
                continue;
            };
            let value = match embed.relation {
                Relation::ToOne => row
                    .get(&embed.foreign_key)
                    .filter(|v| !v.is_null())
                    .and_then(|key| {
                        target.rows.iter().find(|candidate| {
                            candidate
                                .get(&target.primary_key)
                                .is_some_and(|id| same_key(id, key))
                        })
                    })
                    .map(|found| embed_row(tables, &embed.table, found, &embed.select))
                    .unwrap_or(Value::Null),
                Relation::ToMany => Value::Array(
                    own_key
                        .map(|key| {
                            target
                                .rows
                                .iter()
                                .filter(|candidate| {
                                    candidate
                                        .get(&embed.foreign_key)
                                        .is_some_and(|fk| same_key(fk, key))
                                })
                                .map(|found| embed_row(tables, &embed.table, found, &embed.select))
                                .collect()
                        })
                        .unwrap_or_default(),
                ),
            };
            fields.insert(embed.alias.clone(), value);
        }
    }
    resolved
}

fn embed_row(tables: &Tables, table: &str, row: &Value, select: &Select) -> Value {
    select.project(&resolve_row(tables, table, row, select))
}

fn unknown(table: &str) -> StoreError {
    StoreError::UnknownTable(table.to_string())
}

fn matches_all(filters: &[Filter], row: &Value) -> bool {
    filters.iter().all(|f| f.matches(row))
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        self.check_failure()?;
        self.record_select(&query.table);

        let tables = self.tables.read().await;
        let table = tables.get(&query.table).ok_or_else(|| unknown(&query.table))?;
        let mut rows: Vec<Value> = table
            .rows
            .iter()
            .map(|row| resolve_row(&tables, &query.table, row, &query.select))
            .filter(|row| query.matches(row))
            .collect();
        sort_rows(&mut rows, &query.order);
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows.iter().map(|row| query.select.project(row)).collect())
    }

    async fn count(&self, query: &Query) -> Result<u64> {
        self.check_failure()?;
        let tables = self.tables.read().await;
        let table = tables.get(&query.table).ok_or_else(|| unknown(&query.table))?;
        let count = table
            .rows
            .iter()
            .map(|row| resolve_row(&tables, &query.table, row, &query.select))
            .filter(|row| query.matches(row))
            .count();
        Ok(count as u64)
    }

    async fn insert(&self, table_name: &str, mut row: Value, returning: &Select) -> Result<Value> {
        self.check_failure()?;
        let (stored, returned) = {
            let mut tables = self.tables.write().await;
            let table = tables.get_mut(table_name).ok_or_else(|| unknown(table_name))?;
            let primary_key = table.primary_key.clone();
            let Value::Object(fields) = &mut row else {
                return Err(StoreError::rejected("insert payload must be a JSON object"));
            };
            let id = match fields.get(&primary_key).and_then(Value::as_i64) {
                Some(id) if table.contains(id) => {
                    return Err(StoreError::Rejected {
                        status: 409,
                        code: Some("23505".to_string()),
                        message: format!(
                            "duplicate key value violates unique constraint \"{table_name}_pkey\""
                        ),
                    });
                }
                Some(id) => {
                    table.next_id = table.next_id.max(id + 1);
                    id
                }
                None => {
                    let id = table.next_id;
                    table.next_id += 1;
                    id
                }
            };
            fields.insert(primary_key, Value::from(id));
            table.rows.push(row.clone());

            let returned = returning.project(&resolve_row(&tables, table_name, &row, returning));
            (row, returned)
        };

        self.feed
            .publish(ChangeEvent::insert(table_name, stored))
            .await;
        Ok(returned)
    }

    async fn update(
        &self,
        table_name: &str,
        filters: &[Filter],
        patch: Value,
        returning: &Select,
    ) -> Result<Vec<Value>> {
        self.check_failure()?;
        let Value::Object(patch) = patch else {
            return Err(StoreError::rejected("update payload must be a JSON object"));
        };

        let (changes, returned) = {
            let mut tables = self.tables.write().await;
            let table = tables.get_mut(table_name).ok_or_else(|| unknown(table_name))?;
            let mut changes = Vec::new();
            for row in table.rows.iter_mut().filter(|row| matches_all(filters, row)) {
                let old = row.clone();
                if let Value::Object(fields) = row {
                    for (column, value) in &patch {
                        fields.insert(column.clone(), value.clone());
                    }
                }
                changes.push((old, row.clone()));
            }
            let returned: Vec<Value> = changes
                .iter()
                .map(|(_, new)| returning.project(&resolve_row(&tables, table_name, new, returning)))
                .collect();
            (changes, returned)
        };

        for (old, new) in changes {
            self.feed
                .publish(ChangeEvent::update(table_name, old, new))
                .await;
        }
        Ok(returned)
    }

    async fn delete(&self, table_name: &str, filters: &[Filter]) -> Result<()> {
        self.check_failure()?;
        if filters.is_empty() {
            return Err(StoreError::rejected("DELETE requires a WHERE clause"));
        }

        let removed = {
            let mut tables = self.tables.write().await;
            let table = tables.get_mut(table_name).ok_or_else(|| unknown(table_name))?;
            let (removed, kept): (Vec<Value>, Vec<Value>) = std::mem::take(&mut table.rows)
                .into_iter()
                .partition(|row| matches_all(filters, row));
            table.rows = kept;
            removed
        };

        for old in removed {
            self.feed
                .publish(ChangeEvent::delete(table_name, old))
                .await;
        }
        Ok(())
    }
}
