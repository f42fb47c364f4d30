//! Client error types.

use cinesync_core::store::StoreError;
use thiserror::Error;

/// Result type alias for client module.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// PostgREST rejected the request; `message` is its own text.
    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
        details: Option<String>,
        hint: Option<String>,
    },

    #[error("Server returned {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("Row not found: {resource}")]
    NotFound { resource: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ClientError> for StoreError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Api {
                status,
                code,
                message,
                ..
            } => StoreError::Rejected {
                status,
                code,
                message,
            },
            ClientError::ServerError { status, message } => StoreError::Rejected {
                status,
                code: None,
                message,
            },
            ClientError::NotFound { resource } => StoreError::Rejected {
                status: 404,
                code: None,
                message: format!("Row not found: {resource}"),
            },
            ClientError::Json(e) => StoreError::Serialization(e.to_string()),
            ClientError::InvalidResponse(message) => StoreError::Serialization(message),
            other => StoreError::ConnectionFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display_is_message() {
        let error = ClientError::Api {
            status: 409,
            code: Some("23505".to_string()),
            message: "duplicate key value violates unique constraint".to_string(),
            details: None,
            hint: None,
        };
        assert_eq!(
            error.to_string(),
            "duplicate key value violates unique constraint"
        );
    }

    #[test]
    fn test_server_error_display() {
        let error = ClientError::ServerError {
            status: 502,
            message: "Bad Gateway".to_string(),
        };
        assert_eq!(error.to_string(), "Server returned 502: Bad Gateway");
    }

    #[test]
    fn test_api_error_into_store_error_keeps_message() {
        let error = ClientError::Api {
            status: 400,
            code: Some("23502".to_string()),
            message: "null value in column \"titulo\"".to_string(),
            details: None,
            hint: None,
        };
        let store: StoreError = error.into();
        assert_eq!(store.to_string(), "null value in column \"titulo\"");
        assert!(matches!(store, StoreError::Rejected { status: 400, .. }));
    }

    #[test]
    fn test_connection_error_into_store_error() {
        let store: StoreError = ClientError::Connection("refused".to_string()).into();
        assert_eq!(store, StoreError::ConnectionFailed("Connection error: refused".to_string()));
    }
}
