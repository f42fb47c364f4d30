//! Row operations against `/rest/v1/{table}`.

use async_trait::async_trait;
use cinesync_core::store::{self, Filter, Query, RemoteStore, Select, StoreError};
use reqwest::Method;
use serde_json::Value;

use super::{parse_content_range, RestClient};
use crate::error::{ClientError, Result};

const RETURN_REPRESENTATION: &str = "return=representation";

fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters.iter().map(Filter::to_param).collect()
}

impl RestClient {
    /// Run a select with filters, embeds, ordering and limit.
    pub async fn select_rows(&self, query: &Query) -> Result<Vec<Value>> {
        tracing::debug!(table = %query.table, "GET rows");
        let response = self
            .request(Method::GET, &query.table)?
            .query(&query.to_params())
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Fetch one row by primary key.
    pub async fn get_row(&self, table: &str, primary_key: &str, id: i64) -> Result<Value> {
        let query = Query::new(table).eq(primary_key, id).limit(1);
        self.select_rows(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::NotFound {
                resource: format!("{table}.{primary_key}={id}"),
            })
    }

    /// Count matching rows without transferring them.
    pub async fn count_rows(&self, query: &Query) -> Result<u64> {
        let response = self
            .request(Method::HEAD, &query.table)?
            .query(&filter_params(&query.filters))
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::ServerError {
                status: status.as_u16(),
                message: format!("count of {} failed", query.table),
            });
        }
        response
            .headers()
            .get("content-range")
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range)
            .ok_or_else(|| ClientError::InvalidResponse("missing Content-Range total".to_string()))
    }

    /// Insert one row and return the stored representation.
    pub async fn insert_row(&self, table: &str, row: &Value, returning: &Select) -> Result<Value> {
        tracing::debug!(table, "POST row");
        let response = self
            .request(Method::POST, table)?
            .query(&[("select", returning.render())])
            .header("Prefer", RETURN_REPRESENTATION)
            .json(row)
            .send()
            .await?;
        let rows: Vec<Value> = self.handle_response(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ClientError::InvalidResponse(format!("insert into {table} returned no row")))
    }

    /// Patch every row matching `filters`.
    pub async fn update_rows(
        &self,
        table: &str,
        filters: &[Filter],
        patch: &Value,
        returning: &Select,
    ) -> Result<Vec<Value>> {
        tracing::debug!(table, filters = filters.len(), "PATCH rows");
        let mut params = filter_params(filters);
        params.push(("select".to_string(), returning.render()));
        let response = self
            .request(Method::PATCH, table)?
            .query(&params)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(patch)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Delete every row matching `filters`.
    pub async fn delete_rows(&self, table: &str, filters: &[Filter]) -> Result<()> {
        if filters.is_empty() {
            return Err(ClientError::InvalidInput(format!(
                "refusing to delete from {table} without a filter"
            )));
        }
        tracing::debug!(table, filters = filters.len(), "DELETE rows");
        let response = self
            .request(Method::DELETE, table)?
            .query(&filter_params(filters))
            .send()
            .await?;
        self.handle_empty_response(response).await
    }
}

#[async_trait]
impl RemoteStore for RestClient {
    async fn select(&self, query: &Query) -> store::Result<Vec<Value>> {
        self.select_rows(query).await.map_err(StoreError::from)
    }

    async fn count(&self, query: &Query) -> store::Result<u64> {
        self.count_rows(query).await.map_err(StoreError::from)
    }

    async fn insert(&self, table: &str, row: Value, returning: &Select) -> store::Result<Value> {
        self.insert_row(table, &row, returning)
            .await
            .map_err(StoreError::from)
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
        returning: &Select,
    ) -> store::Result<Vec<Value>> {
        self.update_rows(table, filters, &patch, returning)
            .await
            .map_err(StoreError::from)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> store::Result<()> {
        self.delete_rows(table, filters)
            .await
            .map_err(StoreError::from)
    }
}
