//! Schema-to-record pipeline for DBForminator forms.
//!
//! # Philosophy: validate once, then trust
//!
//! A form schema is normalized exactly once at startup. After that it is
//! immutable and shared read-only by everything downstream:
//!
//! 1. **Normalize**: raw document → [`Schema`] (fatal on any [`SchemaError`])
//! 2. **Describe**: [`validator_for`] / [`FieldConstraint`] drive live input feedback
//! 3. **Validate**: raw submission → typed [`Record`] or [`RecordRejected`]
//!
//! No silent coercion: an over-long string is rejected, never truncated.
//!
//! # Modules
//!
//! - [`types`]: Field Type Registry (kinds, storage types, validators, defaults)
//! - [`schema`]: Schema Validator
//! - [`record`]: Record Validator

mod error;
pub mod record;
pub mod schema;
pub mod types;

pub use error::{Result, SchemaError};
pub use record::{validate, FieldFailure, RawRecord, Record, RecordRejected};
pub use schema::{
    is_valid_identifier, normalize, FieldDeclaration, Schema, SchemaOptions, DEFAULT_PRIMARY_KEY,
};
pub use types::{
    blank_value, column_type_for, initial_value, validator_for, FieldConstraint, FieldError,
    FieldKind, FieldValidator, FieldValue, RawValue, StorageType, TypeName, DATETIME_FORMAT,
};
