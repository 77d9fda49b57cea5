//! Error types for the reconciliation engine

use thiserror::Error;

/// Failure of a single call against the identity backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Backend answered with a non-success status
    #[error("{method} {url} failed with status {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// Connection or protocol failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Credential acquisition or refresh failed
    #[error("Auth error: {0}")]
    Auth(String),

    /// Entity does not exist on the backend
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Reconciliation errors
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Broken or inconsistent declaration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unresolvable client or role reference
    #[error("{0}")]
    Reference(String),

    /// Backend call failed where the engine cannot tolerate it
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

impl ReconcileError {
    pub fn client_not_found(client_id: &str) -> Self {
        Self::Reference(format!("Not found client {}", client_id))
    }

    pub fn role_not_found(raw: &str) -> Self {
        Self::Reference(format!("Not found [{}] role", raw))
    }
}

/// Result type for reconciliation operations
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Result type for single backend calls
pub type BackendResult<T> = std::result::Result<T, BackendError>;
