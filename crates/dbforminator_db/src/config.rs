//! Connection descriptors.
//!
//! Backends are selected at compile time via feature flags (`sqlite`, `mysql`,
//! both on by default). Asking for a backend that is unknown or compiled out
//! yields [`StorageError::UnsupportedBackend`].

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::backend::Dialect;
use crate::error::StorageError;

/// Default MySQL server port.
pub const DEFAULT_MYSQL_PORT: u16 = 3306;

/// Default time allowed to establish a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

impl FromStr for Dialect {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Dialect::Sqlite),
            "mysql" => Ok(Dialect::MySql),
            other => Err(StorageError::unsupported_backend(other)),
        }
    }
}

/// Where and how to connect.
#[derive(Clone, PartialEq, Eq)]
pub enum ConnectionDescriptor {
    /// Embedded database file, created if missing.
    Sqlite { path: PathBuf },
    /// Networked server.
    MySql {
        host: String,
        port: u16,
        user: String,
        password: Option<String>,
        database: String,
    },
}

impl std::fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite { path } => f.debug_struct("Sqlite").field("path", path).finish(),
            Self::MySql {
                host,
                port,
                user,
                password,
                database,
            } => f
                .debug_struct("MySql")
                .field("host", host)
                .field("port", port)
                .field("user", user)
                .field("password", &password.as_ref().map(|_| "***"))
                .field("database", database)
                .finish(),
        }
    }
}

impl ConnectionDescriptor {
    /// Create SQLite descriptor.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self::Sqlite { path: path.into() }
    }

    /// Create MySQL descriptor on the default port.
    pub fn mysql(
        host: impl Into<String>,
        user: impl Into<String>,
        password: Option<String>,
        database: impl Into<String>,
    ) -> Self {
        Self::MySql {
            host: host.into(),
            port: DEFAULT_MYSQL_PORT,
            user: user.into(),
            password,
            database: database.into(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            Self::Sqlite { .. } => Dialect::Sqlite,
            Self::MySql { .. } => Dialect::MySql,
        }
    }

    /// Fail with `UnsupportedBackend` if this backend was compiled out.
    pub fn ensure_compiled(&self) -> Result<(), StorageError> {
        let compiled = match self.dialect() {
            Dialect::Sqlite => cfg!(feature = "sqlite"),
            Dialect::MySql => cfg!(feature = "mysql"),
        };
        if compiled {
            Ok(())
        } else {
            Err(StorageError::unsupported_backend(format!(
                "{} (rebuild with the '{}' feature)",
                self.dialect(),
                self.dialect()
            )))
        }
    }

    /// Short description without credentials, for logs.
    pub fn display_target(&self) -> String {
        match self {
            Self::Sqlite { path } => path.display().to_string(),
            Self::MySql {
                host,
                port,
                user,
                database,
                ..
            } => format!("{}@{}:{}/{}", user, host, port, database),
        }
    }
}

/// Connection-level limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Time allowed to open the connection
    pub connect_timeout: Duration,
    /// Time allowed for each statement; `None` waits as long as the backend does
    pub statement_timeout: Option<Duration>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            statement_timeout: None,
        }
    }
}
