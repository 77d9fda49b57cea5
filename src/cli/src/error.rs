use std::path::PathBuf;
use thiserror::Error;

/// Declaration file and profile errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed declaration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Missing section or unusable profile
    #[error("{0}")]
    Configuration(String),

    /// Missing profile or environment variable
    #[error("{0}")]
    Reference(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
