use thiserror::Error;

/// Errors from the persisted dashboard session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session storage failed: {0}")]
    Storage(String),
    #[error("Stored session is corrupted: {0}")]
    Corrupted(String),
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("Administrator role required")]
    NotAdmin,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Credential lookup failed: {0}")]
    Lookup(String),
}
