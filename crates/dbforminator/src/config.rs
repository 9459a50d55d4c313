//! Form configuration file.
//!
//! ```yaml
//! title: Equipment inspection
//! destination_table: inspections
//! form:
//!   columns:
//!     - id: serial
//!       label: Serial number
//!       type: VARCHAR
//!       max_length: 12
//! ```
//!
//! Columns are kept as a raw document so the Schema Validator reports
//! malformed declarations itself.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dbforminator_db::{SchemaEvolution, StorageBridge, StorageConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_TABLE};
use dbforminator_schema::{normalize, Schema, SchemaOptions, DEFAULT_PRIMARY_KEY};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_PATH: &str = "./config/eqinspect.yml";
pub const DEFAULT_TITLE: &str = "Form Application";

#[derive(Debug, Clone, Deserialize)]
pub struct FormConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_table")]
    pub destination_table: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    #[serde(default)]
    pub allow_unknown_types: bool,
    #[serde(default)]
    pub evolution: SchemaEvolution,
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    #[serde(default)]
    pub statement_timeout_secs: Option<u64>,
    #[serde(default)]
    pub form: FormSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormSection {
    #[serde(default)]
    pub columns: Value,
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

fn default_primary_key() -> String {
    DEFAULT_PRIMARY_KEY.to_string()
}

impl FormConfig {
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Option<Self> =
            serde_yaml::from_str(contents).context("Failed to parse form configuration YAML")?;
        config.context("Form configuration is empty")
    }

    pub fn schema_options(&self) -> SchemaOptions {
        SchemaOptions {
            allow_unknown_types: self.allow_unknown_types,
            primary_key: self.primary_key.clone(),
        }
    }

    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            destination_table: self.destination_table.clone(),
            primary_key: self.primary_key.clone(),
            evolution: self.evolution,
            connect_timeout: self
                .connect_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            statement_timeout: self.statement_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// A configuration whose schema and storage settings passed validation.
#[derive(Debug, Clone)]
pub struct LoadedForm {
    pub path: PathBuf,
    pub title: String,
    pub schema: Arc<Schema>,
    pub bridge: StorageBridge,
}

impl LoadedForm {
    pub fn from_config(path: impl Into<PathBuf>, config: FormConfig) -> Result<Self> {
        let path = path.into();
        let schema = normalize(&config.form.columns, &config.schema_options())
            .with_context(|| format!("Invalid form schema in {}", path.display()))?;
        let schema = Arc::new(schema);
        let bridge = StorageBridge::new(Arc::clone(&schema), config.storage_config())
            .with_context(|| format!("Invalid storage settings in {}", path.display()))?;

        info!(
            config = %path.display(),
            fields = schema.len(),
            table = %bridge.table(),
            "Form configuration loaded"
        );
        Ok(Self {
            path,
            title: config.title,
            schema,
            bridge,
        })
    }
}

/// Read, parse, and validate a configuration file.
pub fn load_form(path: &Path) -> Result<LoadedForm> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read form configuration: {}", path.display()))?;
    debug!(config = %path.display(), bytes = contents.len(), "Read form configuration");
    let config = FormConfig::from_yaml(&contents)
        .with_context(|| format!("Invalid form configuration: {}", path.display()))?;
    LoadedForm::from_config(path, config)
}
