//! Backend abstraction: dialects, bound values, and the executor seam.
//!
//! The storage bridge only ever talks to a [`SqlExecutor`]. Statement text
//! carries identifiers; values always travel separately as [`DbValue`]
//! parameters bound to `?` placeholders.

use dbforminator_schema::{FieldValue, StorageType};
use rust_decimal::Decimal;

use crate::error::BackendError;

/// SQL dialect of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Embedded, file-based
    Sqlite,
    /// Networked, server-based
    MySql,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::MySql => "mysql",
        }
    }

    /// Quote an identifier for this dialect, doubling embedded quote characters.
    pub fn quote_ident(&self, name: &str) -> String {
        let quote = match self {
            Self::Sqlite => '"',
            Self::MySql => '`',
        };
        let mut escaped = String::with_capacity(name.len() + 2);
        escaped.push(quote);
        for ch in name.chars() {
            if ch == quote {
                escaped.push(quote);
            }
            escaped.push(ch);
        }
        escaped.push(quote);
        escaped
    }

    /// Render a storage type as a column type.
    ///
    /// SQLite keeps DECIMAL and DATETIME values in TEXT columns: any other
    /// declared type gets NUMERIC affinity, which rewrites numeric-looking text
    /// as INTEGER or REAL and loses digits past double precision.
    pub fn column_type(&self, storage: StorageType) -> String {
        match (self, storage) {
            (_, StorageType::Varchar { length }) => format!("VARCHAR({})", length),
            (Self::Sqlite, StorageType::Integer) => "INTEGER".to_string(),
            (Self::MySql, StorageType::Integer) => "BIGINT".to_string(),
            (Self::Sqlite, StorageType::Decimal { .. } | StorageType::Timestamp) => {
                "TEXT".to_string()
            }
            (Self::MySql, StorageType::Decimal { digits, scale }) => {
                format!("DECIMAL({}, {})", digits, scale)
            }
            (Self::MySql, StorageType::Timestamp) => "DATETIME".to_string(),
            (_, StorageType::Boolean) => "BOOLEAN".to_string(),
        }
    }

    /// Column definition of the synthetic auto-incrementing primary key.
    pub fn primary_key_column(&self, name: &str) -> String {
        let ident = self.quote_ident(name);
        match self {
            Self::Sqlite => format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", ident),
            Self::MySql => format!("{} BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY", ident),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Value type for query parameters and fetched columns.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    Integer(i64),
    Real(f64),
    Decimal(Decimal),
    Text(String),
    Boolean(bool),
}

impl From<i64> for DbValue {
    fn from(v: i64) -> Self {
        DbValue::Integer(v)
    }
}

impl From<String> for DbValue {
    fn from(v: String) -> Self {
        DbValue::Text(v)
    }
}

impl From<&str> for DbValue {
    fn from(v: &str) -> Self {
        DbValue::Text(v.to_string())
    }
}

impl From<bool> for DbValue {
    fn from(v: bool) -> Self {
        DbValue::Boolean(v)
    }
}

impl From<Decimal> for DbValue {
    fn from(v: Decimal) -> Self {
        DbValue::Decimal(v)
    }
}

impl From<&FieldValue> for DbValue {
    fn from(v: &FieldValue) -> Self {
        match v {
            FieldValue::Null => DbValue::Null,
            FieldValue::Text(s) | FieldValue::DateTime(s) => DbValue::Text(s.clone()),
            FieldValue::Integer(n) => DbValue::Integer(*n),
            FieldValue::Decimal(d) => DbValue::Decimal(*d),
            FieldValue::Boolean(b) => DbValue::Boolean(*b),
        }
    }
}

/// The connection capability the storage bridge needs.
///
/// Every call blocks until the backend answers. Implementations own any
/// timeout policy and report it as [`BackendError::Timeout`].
pub trait SqlExecutor {
    /// Dialect used to render statements for this connection.
    fn dialect(&self) -> Dialect;

    /// Execute a DDL statement.
    fn execute(&self, sql: &str) -> Result<(), BackendError>;

    /// Execute a parameterized insert and return the generated row id.
    fn insert(&self, sql: &str, params: &[DbValue]) -> Result<i64, BackendError>;

    /// Column names of an existing table, in table order. Empty if the table is absent.
    fn column_names(&self, table: &str) -> Result<Vec<String>, BackendError>;

    /// Run a parameterized query expected to return at most one row,
    /// decoding column `i` according to `columns[i]`.
    fn fetch_row(
        &self,
        sql: &str,
        params: &[DbValue],
        columns: &[StorageType],
    ) -> Result<Option<Vec<DbValue>>, BackendError>;
}

pub(crate) fn sql_op_name(sql: &str) -> &str {
    sql.split_whitespace().next().unwrap_or("unknown")
}

pub(crate) fn hash_sql(sql: &str) -> String {
    // FNV-1a 64-bit hash for low-cardinality, stable identification.
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in sql.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    format!("{:016x}", hash)
}
