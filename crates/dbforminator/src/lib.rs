//! DBForminator: schema-driven data entry.
//!
//! The binary loads a YAML form configuration, normalizes its schema once,
//! and drives the validation and storage pipeline from the command line.

pub mod config;
pub mod form;

pub use config::{load_form, FormConfig, LoadedForm, DEFAULT_CONFIG_PATH};
pub use form::{apply_assignments, cleared, prefilled, templates, FieldTemplate};
