//! DBForminator command-line front end
//!
//! Loads the form configuration once (any schema problem is fatal), then runs
//! one command against it.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dbforminator::{load_form, DEFAULT_CONFIG_PATH};
use dbforminator_logging::{init_logging, LogConfig};

mod cli;

use cli::ConnectionArgs;

const APPLICATION_NAME: &str = "dbforminator";

#[derive(Parser, Debug)]
#[command(name = "dbforminator", version, about = "DBForminator: schema-driven data entry into SQL tables")]
struct Cli {
    /// Path to the YAML form configuration
    #[arg(short = 'c', long = "config", global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Show debug logs on stderr
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the form configuration and print the table layout
    Check {
        /// Dialect used to render column types
        #[arg(long, default_value = "sqlite")]
        dialect: String,
    },

    /// Print field templates (constraints, initial values) as JSON
    Template,

    /// Create the destination table if it does not exist
    Init {
        #[command(flatten)]
        conn: ConnectionArgs,

        /// Add schema columns missing from an existing table
        #[arg(long)]
        add_missing_columns: bool,
    },

    /// Validate one record and store it
    Submit {
        #[command(flatten)]
        conn: ConnectionArgs,

        /// Field value, as ID=VALUE (repeatable)
        #[arg(short = 's', long = "set", value_name = "ID=VALUE")]
        set: Vec<String>,

        /// Start from a cleared form instead of initial values
        #[arg(long)]
        blank: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a stored row by primary key
    Show {
        #[command(flatten)]
        conn: ConnectionArgs,

        /// Row id returned by submit
        row_id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn run_command(cli: Cli) -> Result<()> {
    let form = load_form(&cli.config)?;

    match cli.command {
        Commands::Check { dialect } => cli::check::run(&form, &dialect),
        Commands::Template => cli::template::run(&form),
        Commands::Init {
            conn,
            add_missing_columns,
        } => cli::store::init(&form, &conn, add_missing_columns),
        Commands::Submit {
            conn,
            set,
            blank,
            json,
        } => cli::store::submit(&form, &conn, &set, blank, json),
        Commands::Show { conn, row_id, json } => cli::store::show(&form, &conn, row_id, json),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(LogConfig {
        app_name: APPLICATION_NAME,
        verbose: cli.verbose,
        log_dir: None,
    }) {
        eprintln!("Warning: file logging disabled: {:#}", err);
    }

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:?}", err);
            ExitCode::from(1)
        }
    }
}
