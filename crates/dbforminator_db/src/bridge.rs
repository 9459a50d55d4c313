//! Storage Bridge: schema → table DDL, record → parameterized insert.
//!
//! Identifiers (table, primary key, field ids) are validated once at
//! construction and always quoted for the connection's dialect. Values never
//! appear in statement text; they are bound to `?` placeholders.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dbforminator_schema::{
    column_type_for, is_valid_identifier, FieldKind, FieldValue, Record, Schema, StorageType,
    DEFAULT_PRIMARY_KEY,
};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::{DbValue, Dialect, SqlExecutor};
use crate::config::{ConnectOptions, ConnectionDescriptor, DEFAULT_CONNECT_TIMEOUT};
use crate::connection::DbConnection;
use crate::error::{BackendError, Result, StorageError};

/// Destination table used when none is configured.
pub const DEFAULT_TABLE: &str = "tablename";

/// Backend-assigned identifier of an inserted row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl RecordId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What to do when an existing table lacks columns the schema declares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaEvolution {
    /// Never alter an existing table; log the missing columns.
    #[default]
    CreateOnly,
    /// Add missing columns. Never drops or retypes.
    AddMissingColumns,
}

/// Storage configuration passed explicitly to the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub destination_table: String,
    pub primary_key: String,
    pub evolution: SchemaEvolution,
    pub connect_timeout: Duration,
    pub statement_timeout: Option<Duration>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            destination_table: DEFAULT_TABLE.to_string(),
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
            evolution: SchemaEvolution::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            statement_timeout: None,
        }
    }
}

impl StorageConfig {
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.destination_table = table.into();
        self
    }

    pub fn with_evolution(mut self, evolution: SchemaEvolution) -> Self {
        self.evolution = evolution;
        self
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            connect_timeout: self.connect_timeout,
            statement_timeout: self.statement_timeout,
        }
    }
}

/// A row read back by primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredRow {
    pub id: RecordId,
    /// Field values in declaration order
    pub values: Vec<(String, FieldValue)>,
}

impl StoredRow {
    pub fn get(&self, id: &str) -> Option<&FieldValue> {
        self.values
            .iter()
            .find(|(field, _)| field == id)
            .map(|(_, value)| value)
    }
}

/// Translates a schema and its records into statements for one table.
#[derive(Debug, Clone)]
pub struct StorageBridge {
    schema: Arc<Schema>,
    config: StorageConfig,
}

impl StorageBridge {
    /// Create a bridge, validating the configured identifiers.
    pub fn new(schema: Arc<Schema>, config: StorageConfig) -> Result<Self> {
        if !is_valid_identifier(&config.destination_table) {
            return Err(StorageError::invalid_config(format!(
                "destination table '{}' is not a valid identifier",
                config.destination_table
            )));
        }
        if !is_valid_identifier(&config.primary_key) {
            return Err(StorageError::invalid_config(format!(
                "primary key '{}' is not a valid identifier",
                config.primary_key
            )));
        }
        if let Some(field) = schema
            .ids()
            .find(|id| id.eq_ignore_ascii_case(&config.primary_key))
        {
            return Err(StorageError::invalid_config(format!(
                "field '{}' collides with primary key column '{}'",
                field, config.primary_key
            )));
        }
        Ok(Self { schema, config })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn table(&self) -> &str {
        &self.config.destination_table
    }

    /// `CREATE TABLE IF NOT EXISTS` with the primary key first, then one column per field.
    pub fn create_table_sql(&self, dialect: Dialect) -> String {
        let mut columns = Vec::with_capacity(self.schema.len() + 1);
        columns.push(dialect.primary_key_column(&self.config.primary_key));
        columns.extend(self.schema.iter().map(|decl| {
            format!(
                "{} {}",
                dialect.quote_ident(&decl.id),
                dialect.column_type(column_type_for(decl))
            )
        }));
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            dialect.quote_ident(self.table()),
            columns.join(", ")
        )
    }

    /// Parameterized insert: quoted schema columns, one `?` per field.
    pub fn insert_sql(&self, dialect: Dialect) -> String {
        let columns: Vec<String> = self.schema.ids().map(|id| dialect.quote_ident(id)).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            dialect.quote_ident(self.table()),
            columns.join(", "),
            placeholders
        )
    }

    /// Parameterized select of all schema columns by primary key.
    pub fn select_sql(&self, dialect: Dialect) -> String {
        let columns: Vec<String> = self.schema.ids().map(|id| dialect.quote_ident(id)).collect();
        format!(
            "SELECT {} FROM {} WHERE {} = ?",
            columns.join(", "),
            dialect.quote_ident(self.table()),
            dialect.quote_ident(&self.config.primary_key)
        )
    }

    fn add_column_sql(&self, dialect: Dialect, id: &str, storage: StorageType) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            dialect.quote_ident(self.table()),
            dialect.quote_ident(id),
            dialect.column_type(storage)
        )
    }

    /// Create the destination table if absent. Safe to call on every startup.
    pub fn ensure_table<E: SqlExecutor + ?Sized>(&self, conn: &E) -> Result<()> {
        let dialect = conn.dialect();
        let apply_err = |source: BackendError| StorageError::SchemaApplyError {
            table: self.table().to_string(),
            source,
        };

        conn.execute(&self.create_table_sql(dialect))
            .map_err(apply_err)?;

        let existing = conn.column_names(self.table()).map_err(apply_err)?;
        let missing: Vec<_> = self
            .schema
            .iter()
            .filter(|decl| !existing.iter().any(|col| col.eq_ignore_ascii_case(&decl.id)))
            .collect();

        if missing.is_empty() {
            debug!(table = %self.table(), backend = %dialect, "Destination table ready");
            return Ok(());
        }

        let names: Vec<&str> = missing.iter().map(|decl| decl.id.as_str()).collect();
        match self.config.evolution {
            SchemaEvolution::CreateOnly => {
                warn!(
                    table = %self.table(),
                    missing = ?names,
                    "Existing table lacks schema columns; inserts will fail until it is migrated"
                );
            }
            SchemaEvolution::AddMissingColumns => {
                for decl in &missing {
                    let sql = self.add_column_sql(dialect, &decl.id, column_type_for(decl));
                    conn.execute(&sql).map_err(apply_err)?;
                }
                info!(table = %self.table(), added = ?names, "Added missing columns");
            }
        }
        Ok(())
    }

    /// Insert a validated record and return the new row id.
    pub fn insert<E: SqlExecutor + ?Sized>(&self, record: &Record, conn: &E) -> Result<RecordId> {
        if !record.ids().eq(self.schema.ids()) {
            return Err(StorageError::RecordMismatch {
                expected: self.schema.ids().map(str::to_string).collect(),
                got: record.ids().map(str::to_string).collect(),
            });
        }

        let params: Vec<DbValue> = record.values().iter().map(|(_, v)| DbValue::from(v)).collect();
        let id = conn
            .insert(&self.insert_sql(conn.dialect()), &params)
            .map_err(|source| StorageError::InsertFailed {
                table: self.table().to_string(),
                source,
            })?;

        info!(table = %self.table(), row_id = id, "Record persisted");
        Ok(RecordId(id))
    }

    /// Read a row back by primary key.
    pub fn fetch<E: SqlExecutor + ?Sized>(&self, id: RecordId, conn: &E) -> Result<Option<StoredRow>> {
        let fetch_err = |source: BackendError| StorageError::FetchFailed {
            table: self.table().to_string(),
            source,
        };
        let storage: Vec<StorageType> = self.schema.iter().map(column_type_for).collect();

        let Some(row) = conn
            .fetch_row(&self.select_sql(conn.dialect()), &[DbValue::Integer(id.0)], &storage)
            .map_err(fetch_err)?
        else {
            return Ok(None);
        };

        let values = self
            .schema
            .iter()
            .zip(row)
            .map(|(decl, value)| Ok((decl.id.clone(), to_field_value(&decl.kind, value)?)))
            .collect::<std::result::Result<Vec<_>, BackendError>>()
            .map_err(fetch_err)?;

        Ok(Some(StoredRow { id, values }))
    }

    /// Open a connection, ensure the table, insert, and close.
    ///
    /// The connection is released on every exit path.
    pub fn persist(&self, descriptor: &ConnectionDescriptor, record: &Record) -> Result<RecordId> {
        let conn = DbConnection::open(descriptor, self.config.connect_options())?;
        self.ensure_table(&conn)?;
        let id = self.insert(record, &conn)?;
        conn.close();
        Ok(id)
    }
}

fn to_field_value(kind: &FieldKind, value: DbValue) -> std::result::Result<FieldValue, BackendError> {
    let mismatch = |value: &DbValue| {
        BackendError::TypeConversion(format!(
            "cannot read {:?} as {}",
            value,
            kind.type_name()
        ))
    };

    let converted = match (kind, value) {
        (_, DbValue::Null) => FieldValue::Null,
        (FieldKind::Varchar { .. } | FieldKind::Unknown { .. }, DbValue::Text(s)) => FieldValue::Text(s),
        (FieldKind::Integer, DbValue::Integer(n)) => FieldValue::Integer(n),
        (FieldKind::Decimal { .. }, DbValue::Decimal(d)) => FieldValue::Decimal(d),
        (FieldKind::Decimal { .. }, DbValue::Integer(n)) => FieldValue::Decimal(Decimal::from(n)),
        (FieldKind::Decimal { precision }, DbValue::Real(f)) => {
            let d = Decimal::from_f64(f).ok_or_else(|| mismatch(&DbValue::Real(f)))?;
            FieldValue::Decimal(d.round_dp(*precision))
        }
        (FieldKind::DateTime, DbValue::Text(s)) => FieldValue::DateTime(s),
        (FieldKind::Boolean, DbValue::Boolean(b)) => FieldValue::Boolean(b),
        (FieldKind::Boolean, DbValue::Integer(n)) => FieldValue::Boolean(n != 0),
        (_, other) => return Err(mismatch(&other)),
    };
    Ok(converted)
}
