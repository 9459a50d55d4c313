//! Error types for the storage layer.

use std::time::Duration;

use thiserror::Error;

/// Storage operation result type.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors from a single statement on a connection.
#[derive(Debug, Error)]
pub enum BackendError {
    /// SQLx error (connection, query, etc.)
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// IO error while setting up the connection runtime
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The statement or connection attempt did not finish in time
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The connection was already closed
    #[error("Connection is closed")]
    Closed,

    #[error("Type conversion error: {0}")]
    TypeConversion(String),
}

/// Storage Bridge errors.
///
/// Surfaced to the user as a single failure notice. Nothing here is retried
/// automatically.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend kind is not supported (or not compiled in)
    #[error("Unsupported database backend: {0}")]
    UnsupportedBackend(String),

    /// Opening the connection failed
    #[error("Failed to connect to {backend} database: {source}")]
    Connect {
        backend: &'static str,
        #[source]
        source: BackendError,
    },

    /// Storage configuration is unusable
    #[error("Invalid storage configuration: {0}")]
    InvalidConfig(String),

    /// The backend rejected the table definition
    #[error("Failed to apply schema to table '{table}': {source}")]
    SchemaApplyError {
        table: String,
        #[source]
        source: BackendError,
    },

    /// The insert statement failed
    #[error("Failed to insert into table '{table}': {source}")]
    InsertFailed {
        table: String,
        #[source]
        source: BackendError,
    },

    /// Reading a row back failed
    #[error("Failed to read from table '{table}': {source}")]
    FetchFailed {
        table: String,
        #[source]
        source: BackendError,
    },

    /// The record was not built from this bridge's schema
    #[error("Record fields {got:?} do not match schema fields {expected:?}")]
    RecordMismatch {
        expected: Vec<String>,
        got: Vec<String>,
    },
}

impl StorageError {
    pub fn unsupported_backend(name: impl Into<String>) -> Self {
        Self::UnsupportedBackend(name.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether the underlying cause was a timeout.
    pub fn is_timeout(&self) -> bool {
        let source = match self {
            Self::Connect { source, .. }
            | Self::SchemaApplyError { source, .. }
            | Self::InsertFailed { source, .. }
            | Self::FetchFailed { source, .. } => source,
            _ => return false,
        };
        matches!(
            source,
            BackendError::Timeout(_) | BackendError::Sqlx(sqlx::Error::PoolTimedOut)
        )
    }
}
