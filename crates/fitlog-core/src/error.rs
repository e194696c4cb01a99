//! Error types for fitlog-core

use thiserror::Error;

/// Result type alias using fitlog-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in fitlog-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Remote store failure (network, timeout, non-2xx response)
    #[error("Remote store error: {0}")]
    Remote(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Local cache write/read failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unexpected record shape or unreadable cached data
    #[error("Corrupted data: {0}")]
    Corruption(String),
}

impl Error {
    /// Whether the failure is transient and worth retrying on a later pass.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Remote(_) | Self::Http(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(Error::Remote("connection reset".to_string()).is_transient());
        assert!(!Error::Persistence("disk full".to_string()).is_transient());
        assert!(!Error::InvalidInput("bad id".to_string()).is_transient());
    }
}
