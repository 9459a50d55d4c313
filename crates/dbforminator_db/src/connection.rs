//! Blocking database connection over sqlx pools.
//!
//! Each [`DbConnection`] owns a current-thread tokio runtime and a
//! single-connection pool. Calls block the caller until the backend answers,
//! so nothing in the core suspends cooperatively. The pool is closed when the
//! connection is dropped, on every exit path.
//!
//! Do not create or drop a `DbConnection` from inside another tokio runtime.

use std::future::Future;
use std::time::{Duration, Instant};

use dbforminator_schema::StorageType;
use tracing::{debug_span, info};

use crate::backend::{hash_sql, sql_op_name, Dialect, DbValue, SqlExecutor};
use crate::config::{ConnectOptions, ConnectionDescriptor};
use crate::error::{BackendError, StorageError};

#[cfg(not(any(feature = "sqlite", feature = "mysql")))]
compile_error!("dbforminator_db needs at least one of the 'sqlite' or 'mysql' features");

#[cfg(feature = "sqlite")]
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};

#[cfg(feature = "mysql")]
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};

enum Pool {
    #[cfg(feature = "sqlite")]
    Sqlite(SqlitePool),
    #[cfg(feature = "mysql")]
    MySql(MySqlPool),
}

/// Blocking connection to one backend.
pub struct DbConnection {
    runtime: tokio::runtime::Runtime,
    pool: Option<Pool>,
    dialect: Dialect,
    target: String,
    statement_timeout: Option<Duration>,
}

impl std::fmt::Debug for DbConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConnection")
            .field("backend", &self.dialect)
            .field("target", &self.target)
            .field("open", &self.pool.is_some())
            .finish()
    }
}

impl DbConnection {
    /// Open a connection described by `descriptor`.
    pub fn open(
        descriptor: &ConnectionDescriptor,
        options: ConnectOptions,
    ) -> Result<Self, StorageError> {
        descriptor.ensure_compiled()?;
        let dialect = descriptor.dialect();
        let connect_err = |source: BackendError| StorageError::Connect {
            backend: dialect.as_str(),
            source,
        };

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| connect_err(e.into()))?;

        let pool = match descriptor {
            #[cfg(feature = "sqlite")]
            ConnectionDescriptor::Sqlite { path } => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| connect_err(e.into()))?;
                }
                let connect = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)
                    .busy_timeout(options.connect_timeout);
                let fut = sqlite_pool_options(options).connect_with(connect);
                Pool::Sqlite(block_on_limited(&runtime, Some(options.connect_timeout), fut).map_err(connect_err)?)
            }
            #[cfg(feature = "mysql")]
            ConnectionDescriptor::MySql {
                host,
                port,
                user,
                password,
                database,
            } => {
                let mut connect = MySqlConnectOptions::new()
                    .host(host)
                    .port(*port)
                    .username(user)
                    .database(database);
                if let Some(password) = password {
                    connect = connect.password(password);
                }
                let fut = MySqlPoolOptions::new()
                    .max_connections(1)
                    .acquire_timeout(options.connect_timeout)
                    .connect_with(connect);
                Pool::MySql(block_on_limited(&runtime, Some(options.connect_timeout), fut).map_err(connect_err)?)
            }
            #[allow(unreachable_patterns)]
            _ => return Err(StorageError::unsupported_backend(dialect.as_str())),
        };

        let target = descriptor.display_target();
        info!(backend = %dialect, target = %target, "Database connection opened");

        Ok(Self {
            runtime,
            pool: Some(pool),
            dialect,
            target,
            statement_timeout: options.statement_timeout,
        })
    }

    /// Open an in-memory SQLite database (for testing).
    #[cfg(feature = "sqlite")]
    pub fn open_sqlite_memory() -> Result<Self, StorageError> {
        let connect_err = |source: BackendError| StorageError::Connect {
            backend: Dialect::Sqlite.as_str(),
            source,
        };
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| connect_err(e.into()))?;
        let options = ConnectOptions::default();
        let fut = sqlite_pool_options(options).connect_with(SqliteConnectOptions::new().in_memory(true));
        let pool = block_on_limited(&runtime, Some(options.connect_timeout), fut).map_err(connect_err)?;

        Ok(Self {
            runtime,
            pool: Some(Pool::Sqlite(pool)),
            dialect: Dialect::Sqlite,
            target: ":memory:".to_string(),
            statement_timeout: None,
        })
    }

    /// Close the connection now instead of at drop.
    pub fn close(mut self) {
        self.shutdown();
    }

    pub fn is_open(&self) -> bool {
        self.pool.is_some()
    }

    fn shutdown(&mut self) {
        let Some(pool) = self.pool.take() else {
            return;
        };
        match pool {
            #[cfg(feature = "sqlite")]
            Pool::Sqlite(pool) => self.runtime.block_on(pool.close()),
            #[cfg(feature = "mysql")]
            Pool::MySql(pool) => self.runtime.block_on(pool.close()),
        }
        info!(backend = %self.dialect, target = %self.target, "Database connection closed");
    }

    fn pool(&self) -> Result<&Pool, BackendError> {
        self.pool.as_ref().ok_or(BackendError::Closed)
    }

    fn block_on<T, F>(&self, fut: F) -> Result<T, BackendError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        block_on_limited(&self.runtime, self.statement_timeout, fut)
    }
}

impl Drop for DbConnection {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn block_on_limited<T, F>(
    runtime: &tokio::runtime::Runtime,
    limit: Option<Duration>,
    fut: F,
) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match limit {
        Some(limit) => runtime
            .block_on(async { tokio::time::timeout(limit, fut).await })
            .map_err(|_| BackendError::Timeout(limit))?
            .map_err(BackendError::from),
        None => runtime.block_on(fut).map_err(BackendError::from),
    }
}

#[cfg(feature = "sqlite")]
fn sqlite_pool_options(options: ConnectOptions) -> SqlitePoolOptions {
    // One long-lived connection; in-memory databases vanish with their connection.
    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None::<Duration>)
        .max_lifetime(None::<Duration>)
        .acquire_timeout(options.connect_timeout)
}

impl SqlExecutor for DbConnection {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn execute(&self, sql: &str) -> Result<(), BackendError> {
        let span = statement_span("db.exec", sql);
        let _guard = span.enter();
        let start = Instant::now();

        match self.pool()? {
            #[cfg(feature = "sqlite")]
            Pool::Sqlite(pool) => {
                self.block_on(sqlx::query(sql).execute(pool))?;
            }
            #[cfg(feature = "mysql")]
            Pool::MySql(pool) => {
                self.block_on(sqlx::query(sql).execute(pool))?;
            }
        }

        span.record("duration_ms", start.elapsed().as_millis() as u64);
        Ok(())
    }

    fn insert(&self, sql: &str, params: &[DbValue]) -> Result<i64, BackendError> {
        let span = statement_span("db.insert", sql);
        let _guard = span.enter();
        let start = Instant::now();

        let id = match self.pool()? {
            #[cfg(feature = "sqlite")]
            Pool::Sqlite(pool) => {
                let result = self.block_on(bind_sqlite(sqlx::query(sql), params).execute(pool))?;
                result.last_insert_rowid()
            }
            #[cfg(feature = "mysql")]
            Pool::MySql(pool) => {
                let result = self.block_on(bind_mysql(sqlx::query(sql), params).execute(pool))?;
                i64::try_from(result.last_insert_id()).map_err(|_| {
                    BackendError::TypeConversion("insert id does not fit in i64".to_string())
                })?
            }
        };

        span.record("duration_ms", start.elapsed().as_millis() as u64);
        Ok(id)
    }

    fn column_names(&self, table: &str) -> Result<Vec<String>, BackendError> {
        use sqlx::Row;

        match self.pool()? {
            #[cfg(feature = "sqlite")]
            Pool::Sqlite(pool) => {
                let sql = "SELECT name FROM pragma_table_info(?)";
                let span = statement_span("db.query", sql);
                let _guard = span.enter();
                let rows = self.block_on(sqlx::query(sql).bind(table).fetch_all(pool))?;
                rows.iter()
                    .map(|row| row.try_get::<String, _>(0).map_err(BackendError::from))
                    .collect()
            }
            #[cfg(feature = "mysql")]
            Pool::MySql(pool) => {
                let sql = "SELECT CAST(COLUMN_NAME AS CHAR) FROM information_schema.COLUMNS \
                           WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
                           ORDER BY ORDINAL_POSITION";
                let span = statement_span("db.query", sql);
                let _guard = span.enter();
                let rows = self.block_on(sqlx::query(sql).bind(table).fetch_all(pool))?;
                rows.iter()
                    .map(|row| row.try_get::<String, _>(0).map_err(BackendError::from))
                    .collect()
            }
        }
    }

    fn fetch_row(
        &self,
        sql: &str,
        params: &[DbValue],
        columns: &[StorageType],
    ) -> Result<Option<Vec<DbValue>>, BackendError> {
        let span = statement_span("db.query", sql);
        let _guard = span.enter();
        let start = Instant::now();

        let values = match self.pool()? {
            #[cfg(feature = "sqlite")]
            Pool::Sqlite(pool) => {
                let row = self.block_on(bind_sqlite(sqlx::query(sql), params).fetch_optional(pool))?;
                row.map(|row| {
                    columns
                        .iter()
                        .enumerate()
                        .map(|(i, storage)| decode_sqlite(&row, i, *storage))
                        .collect::<Result<Vec<_>, _>>()
                })
                .transpose()?
            }
            #[cfg(feature = "mysql")]
            Pool::MySql(pool) => {
                let row = self.block_on(bind_mysql(sqlx::query(sql), params).fetch_optional(pool))?;
                row.map(|row| {
                    columns
                        .iter()
                        .enumerate()
                        .map(|(i, storage)| decode_mysql(&row, i, *storage))
                        .collect::<Result<Vec<_>, _>>()
                })
                .transpose()?
            }
        };

        span.record("duration_ms", start.elapsed().as_millis() as u64);
        Ok(values)
    }
}

fn statement_span(name: &'static str, sql: &str) -> tracing::Span {
    let op = sql_op_name(sql);
    let sql_hash = hash_sql(sql);
    match name {
        "db.insert" => debug_span!("db.insert", op = op, sql_hash = %sql_hash, duration_ms = tracing::field::Empty),
        "db.query" => debug_span!("db.query", op = op, sql_hash = %sql_hash, duration_ms = tracing::field::Empty),
        _ => debug_span!("db.exec", op = op, sql_hash = %sql_hash, duration_ms = tracing::field::Empty),
    }
}

#[cfg(feature = "sqlite")]
type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>>;

#[cfg(feature = "sqlite")]
fn bind_sqlite<'q>(mut query: SqliteQuery<'q>, params: &'q [DbValue]) -> SqliteQuery<'q> {
    for param in params {
        query = match param {
            DbValue::Null => query.bind(None::<String>),
            DbValue::Integer(v) => query.bind(*v),
            DbValue::Real(v) => query.bind(*v),
            // TEXT column; the exact digits and scale are kept.
            DbValue::Decimal(v) => query.bind(v.to_string()),
            DbValue::Text(v) => query.bind(v.as_str()),
            DbValue::Boolean(v) => query.bind(*v),
        };
    }
    query
}

#[cfg(feature = "mysql")]
type MySqlQuery<'q> = sqlx::query::Query<'q, sqlx::MySql, MySqlArguments>;

#[cfg(feature = "mysql")]
fn bind_mysql<'q>(mut query: MySqlQuery<'q>, params: &'q [DbValue]) -> MySqlQuery<'q> {
    for param in params {
        query = match param {
            DbValue::Null => query.bind(None::<String>),
            DbValue::Integer(v) => query.bind(*v),
            DbValue::Real(v) => query.bind(*v),
            DbValue::Decimal(v) => query.bind(*v),
            DbValue::Text(v) => query.bind(v.as_str()),
            DbValue::Boolean(v) => query.bind(*v),
        };
    }
    query
}

#[cfg(feature = "sqlite")]
fn decode_sqlite(row: &SqliteRow, index: usize, storage: StorageType) -> Result<DbValue, BackendError> {
    use sqlx::{Row, ValueRef};

    if row.try_get_raw(index)?.is_null() {
        return Ok(DbValue::Null);
    }

    // SQLite stores by value, not by declared type: fall back across storage classes.
    let value = match storage {
        StorageType::Integer => DbValue::Integer(row.try_get(index)?),
        StorageType::Boolean => DbValue::Boolean(
            row.try_get::<bool, _>(index)
                .or_else(|_| row.try_get::<i64, _>(index).map(|v| v != 0))?,
        ),
        StorageType::Decimal { .. } => match row.try_get::<String, _>(index) {
            Ok(text) => DbValue::Decimal(text.parse::<rust_decimal::Decimal>().map_err(|e| {
                BackendError::TypeConversion(format!("invalid decimal '{}': {}", text, e))
            })?),
            // Tables created with a numeric DECIMAL column hold REAL or INTEGER values.
            Err(_) => match row.try_get::<f64, _>(index) {
                Ok(v) => DbValue::Real(v),
                Err(_) => DbValue::Integer(row.try_get(index)?),
            },
        },
        StorageType::Varchar { .. } | StorageType::Timestamp => DbValue::Text(
            row.try_get::<String, _>(index)
                .or_else(|_| row.try_get::<i64, _>(index).map(|v| v.to_string()))
                .or_else(|_| row.try_get::<f64, _>(index).map(|v| v.to_string()))?,
        ),
    };
    Ok(value)
}

#[cfg(feature = "mysql")]
fn decode_mysql(row: &MySqlRow, index: usize, storage: StorageType) -> Result<DbValue, BackendError> {
    use sqlx::{Row, ValueRef};

    if row.try_get_raw(index)?.is_null() {
        return Ok(DbValue::Null);
    }

    let value = match storage {
        StorageType::Integer => DbValue::Integer(row.try_get(index)?),
        StorageType::Boolean => DbValue::Boolean(
            row.try_get::<bool, _>(index)
                .or_else(|_| row.try_get::<i8, _>(index).map(|v| v != 0))?,
        ),
        StorageType::Decimal { .. } => DbValue::Decimal(row.try_get(index)?),
        StorageType::Timestamp => DbValue::Text(
            row.try_get::<chrono::NaiveDateTime, _>(index)
                .map(|v| v.format(dbforminator_schema::DATETIME_FORMAT).to_string())
                .or_else(|_| row.try_get::<String, _>(index))?,
        ),
        StorageType::Varchar { .. } => DbValue::Text(row.try_get(index)?),
    };
    Ok(value)
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;

    #[test]
    fn test_memory_insert_returns_row_ids() {
        let conn = DbConnection::open_sqlite_memory().unwrap();
        conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)")
            .unwrap();

        let first = conn
            .insert("INSERT INTO t (name) VALUES (?)", &[DbValue::from("alpha")])
            .unwrap();
        let second = conn
            .insert("INSERT INTO t (name) VALUES (?)", &[DbValue::from("beta")])
            .unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[test]
    fn test_column_names_of_missing_table_is_empty() {
        let conn = DbConnection::open_sqlite_memory().unwrap();
        assert!(conn.column_names("nope").unwrap().is_empty());

        conn.execute("CREATE TABLE t (id INTEGER, label TEXT)").unwrap();
        assert_eq!(conn.column_names("t").unwrap(), vec!["id", "label"]);
    }

    #[test]
    fn test_fetch_row_decodes_by_storage_type() {
        let conn = DbConnection::open_sqlite_memory().unwrap();
        conn.execute("CREATE TABLE t (n INTEGER, b BOOLEAN, d TEXT, s VARCHAR(5))")
            .unwrap();
        conn.insert(
            "INSERT INTO t (n, b, d, s) VALUES (?, ?, ?, ?)",
            &[
                DbValue::Integer(4),
                DbValue::Boolean(true),
                DbValue::Decimal(rust_decimal::Decimal::new(250, 2)),
                DbValue::Null,
            ],
        )
        .unwrap();

        let row = conn
            .fetch_row(
                "SELECT n, b, d, s FROM t",
                &[],
                &[
                    StorageType::Integer,
                    StorageType::Boolean,
                    StorageType::Decimal { digits: 38, scale: 2 },
                    StorageType::Varchar { length: 5 },
                ],
            )
            .unwrap()
            .unwrap();

        assert_eq!(row[0], DbValue::Integer(4));
        assert_eq!(row[1], DbValue::Boolean(true));
        assert_eq!(row[2], DbValue::Decimal(rust_decimal::Decimal::new(250, 2)));
        assert_eq!(row[3], DbValue::Null);
    }

    #[test]
    fn test_numeric_decimal_column_falls_back_to_real() {
        let conn = DbConnection::open_sqlite_memory().unwrap();
        conn.execute("CREATE TABLE t (d DECIMAL(38, 2))").unwrap();
        conn.insert("INSERT INTO t (d) VALUES (?)", &[DbValue::from("2.5")])
            .unwrap();

        let row = conn
            .fetch_row("SELECT d FROM t", &[], &[StorageType::Decimal { digits: 38, scale: 2 }])
            .unwrap()
            .unwrap();
        assert_eq!(row[0], DbValue::Real(2.5));
    }

    #[test]
    fn test_closed_connection_rejects_statements() {
        let mut conn = DbConnection::open_sqlite_memory().unwrap();
        conn.shutdown();
        assert!(!conn.is_open());
        assert!(matches!(conn.execute("SELECT 1"), Err(BackendError::Closed)));
    }

    #[test]
    fn test_bad_sql_surfaces_backend_error() {
        let conn = DbConnection::open_sqlite_memory().unwrap();
        assert!(matches!(
            conn.execute("CREATE TABLE ("),
            Err(BackendError::Sqlx(_))
        ));
    }
}
