//! HTTP and WebSocket clients for the hosted database.

pub mod protocol;
pub mod realtime;
pub mod rows;

use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use url::Url;

use crate::error::{ClientError, Result};

pub use realtime::{RealtimeClient, RealtimeConfig};

/// Default schema exposed by PostgREST.
pub const DEFAULT_SCHEMA: &str = "public";

/// PostgREST client for the `/rest/v1` surface.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    schema: String,
}

/// Error body returned by PostgREST on non-2xx responses.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    message: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

impl RestClient {
    /// Create a new client for the project at `base_url`.
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: parse_base_url(base_url)?,
            api_key: api_key.into(),
            schema: DEFAULT_SCHEMA.to_string(),
        })
    }

    /// Create from environment (`CINESYNC_URL`, `CINESYNC_API_KEY`, `CINESYNC_SCHEMA`).
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("CINESYNC_URL")
            .map_err(|_| ClientError::InvalidInput("CINESYNC_URL is not set".to_string()))?;
        let api_key = std::env::var("CINESYNC_API_KEY")
            .map_err(|_| ClientError::InvalidInput("CINESYNC_API_KEY is not set".to_string()))?;
        let schema = std::env::var("CINESYNC_SCHEMA").unwrap_or_else(|_| DEFAULT_SCHEMA.to_string());
        Ok(Self::new(&base_url, api_key)?.with_schema(schema))
    }

    /// Target a schema other than `public`.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Build the URL for a table endpoint.
    fn table_url(&self, table: &str) -> Result<Url> {
        if table.is_empty() || table.contains('/') {
            return Err(ClientError::InvalidInput(format!("invalid table name: {table:?}")));
        }
        Ok(self.base_url.join(&format!("rest/v1/{table}"))?)
    }

    /// Start a request with the key and schema headers applied.
    fn request(&self, method: Method, table: &str) -> Result<RequestBuilder> {
        let url = self.table_url(table)?;
        let mut builder = self
            .client
            .request(method.clone(), url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key);
        if self.schema != DEFAULT_SCHEMA {
            let header = if method == Method::GET || method == Method::HEAD {
                "Accept-Profile"
            } else {
                "Content-Profile"
            };
            builder = builder.header(header, &self.schema);
        }
        Ok(builder)
    }

    /// Handle error responses.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            response.json().await.map_err(ClientError::from)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(api_error(status.as_u16(), &body))
        }
    }

    /// Handle responses where no body is expected.
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(api_error(status.as_u16(), &body))
        }
    }
}

/// Normalizes the project URL so relative joins keep its path.
fn parse_base_url(base_url: &str) -> Result<Url> {
    let trimmed = base_url.trim().trim_end_matches('/');
    Ok(Url::parse(&format!("{trimmed}/"))?)
}

/// Turns a failed response body into an error, keeping PostgREST's message.
fn api_error(status: u16, body: &str) -> ClientError {
    match serde_json::from_str::<PostgrestError>(body) {
        Ok(error) => ClientError::Api {
            status,
            code: error.code,
            message: error.message,
            details: error.details,
            hint: error.hint,
        },
        Err(_) if body.trim().is_empty() => ClientError::ServerError {
            status,
            message: "Unknown error".to_string(),
        },
        Err(_) => ClientError::ServerError {
            status,
            message: body.trim().to_string(),
        },
    }
}

/// Reads the total out of a `Content-Range` header (`0-9/42` or `*/42`).
fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}
