//! Storage Bridge for DBForminator.
//!
//! Turns a normalized [`Schema`](dbforminator_schema::Schema) into a table
//! and validated records into rows, over SQLite or MySQL.
//!
//! # Feature Flags
//!
//! - `sqlite`: embedded file-based backend (default)
//! - `mysql`: networked server backend (default)
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dbforminator_db::{ConnectionDescriptor, DbConnection, StorageBridge, StorageConfig};
//!
//! let bridge = StorageBridge::new(Arc::new(schema), StorageConfig::default())?;
//! let conn = DbConnection::open(&ConnectionDescriptor::sqlite("forms.db"), Default::default())?;
//! bridge.ensure_table(&conn)?;
//! let id = bridge.insert(&record, &conn)?;
//! ```

pub mod backend;
pub mod bridge;
mod config;
mod connection;
mod error;
pub mod submission;

pub use backend::{DbValue, Dialect, SqlExecutor};
pub use bridge::{
    RecordId, SchemaEvolution, StorageBridge, StorageConfig, StoredRow, DEFAULT_TABLE,
};
pub use config::{ConnectOptions, ConnectionDescriptor, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MYSQL_PORT};
pub use connection::DbConnection;
pub use error::{BackendError, Result, StorageError};
pub use submission::{submit, Submission, SubmissionOutcome, SubmissionState, ValidatedSubmission};
