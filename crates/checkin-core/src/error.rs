//! Error types for checkin-core

use thiserror::Error;

use crate::remote::RemoteError;

/// Result type alias using checkin-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in checkin-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// The local storage engine could not be opened or is unusable
    #[error("Local storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The remote service could not be reached
    #[error("Remote service unavailable: {0}")]
    RemoteUnavailable(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote client error other than plain unavailability
    #[error(transparent)]
    Remote(RemoteError),
}

impl Error {
    /// Whether the failure came from the local persistence layer.
    #[must_use]
    pub const fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            Self::StorageUnavailable(_) | Self::Database(_) | Self::LibSql(_) | Self::Io(_)
        )
    }
}

impl From<RemoteError> for Error {
    fn from(value: RemoteError) -> Self {
        match value {
            RemoteError::Unavailable(message) => Self::RemoteUnavailable(message),
            other => Self::Remote(other),
        }
    }
}
