use rolemerge_reconcile::BackendError;
use thiserror::Error;

/// Connection and authentication errors
#[derive(Debug, Error)]
pub enum KeycloakError {
    #[error("Invalid base URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("OpenID discovery failed for {url}: {reason}")]
    Discovery { url: String, reason: String },

    #[error("Token request failed with status {status}: {body}")]
    Token { status: u16, body: String },

    #[error("No refresh token issued")]
    MissingRefreshToken,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<KeycloakError> for BackendError {
    fn from(err: KeycloakError) -> Self {
        BackendError::Auth(err.to_string())
    }
}

/// Result type for connection and token operations
pub type Result<T> = std::result::Result<T, KeycloakError>;
