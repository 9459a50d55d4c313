//! CLI commands for DBForminator

pub mod check;
pub mod output;
pub mod store;
pub mod template;

use anyhow::{Context, Result};
use clap::Args;
use dbforminator_db::{ConnectionDescriptor, Dialect};

/// Where to store records.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Database backend (sqlite or mysql)
    #[arg(short = 't', long = "dbtype")]
    pub dbtype: String,

    /// SQLite database file, or MySQL host
    #[arg(short = 'n', long = "connection", alias = "cn")]
    pub connection: Option<String>,

    /// MySQL host (overrides --connection)
    #[arg(long)]
    pub host: Option<String>,

    /// MySQL port
    #[arg(long)]
    pub port: Option<u16>,

    /// MySQL user
    #[arg(long)]
    pub user: Option<String>,

    /// MySQL password
    #[arg(long, env = "DBFORMINATOR_DB_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// MySQL database name
    #[arg(long)]
    pub database: Option<String>,
}

impl ConnectionArgs {
    pub fn descriptor(&self) -> Result<ConnectionDescriptor> {
        let dialect: Dialect = self.dbtype.parse()?;
        match dialect {
            Dialect::Sqlite => {
                let path = self
                    .connection
                    .as_deref()
                    .context("--connection <FILE> is required for sqlite")?;
                Ok(ConnectionDescriptor::sqlite(path))
            }
            Dialect::MySql => {
                let host = self
                    .host
                    .clone()
                    .or_else(|| self.connection.clone())
                    .context("--host (or --connection) is required for mysql")?;
                let user = self.user.clone().context("--user is required for mysql")?;
                let database = self
                    .database
                    .clone()
                    .context("--database is required for mysql")?;

                let mut descriptor =
                    ConnectionDescriptor::mysql(host, user, self.password.clone(), database);
                if let (Some(custom), ConnectionDescriptor::MySql { port, .. }) =
                    (self.port, &mut descriptor)
                {
                    *port = custom;
                }
                Ok(descriptor)
            }
        }
    }
}
