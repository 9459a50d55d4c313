//! Record Validator.
//!
//! Turns a raw submission (field id → widget value) into a typed [`Record`],
//! or reports every failing field at once.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::Schema;
use crate::types::{validator_for, FieldError, FieldValue, RawValue};

/// Raw submission from the presentation layer.
pub type RawRecord = BTreeMap<String, RawValue>;

/// One validated submission, ordered like the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    values: Vec<(String, FieldValue)>,
}

impl Record {
    /// Field values in declaration order.
    pub fn values(&self) -> &[(String, FieldValue)] {
        &self.values
    }

    pub fn get(&self, id: &str) -> Option<&FieldValue> {
        self.values
            .iter()
            .find(|(field, _)| field == id)
            .map(|(_, value)| value)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(id, _)| id.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A single field failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFailure {
    pub field: String,
    #[serde(flatten)]
    pub error: FieldError,
}

/// Every field that failed validation for one submission.
///
/// Failures are listed in declaration order; ids not in the schema come last.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{} field(s) failed validation", .failures.len())]
pub struct RecordRejected {
    pub failures: Vec<FieldFailure>,
}

impl RecordRejected {
    /// Error for a field, if it failed.
    pub fn get(&self, field: &str) -> Option<&FieldError> {
        self.failures
            .iter()
            .find(|f| f.field == field)
            .map(|f| &f.error)
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|f| f.field.as_str())
    }
}

/// Validate a raw submission against the schema.
///
/// A missing text entry counts as empty string, a missing toggle as `false`.
/// Pure: no I/O, no coercion beyond what each field validator defines.
pub fn validate(schema: &Schema, raw: &RawRecord) -> Result<Record, RecordRejected> {
    let mut values = Vec::with_capacity(schema.len());
    let mut failures = Vec::new();

    for decl in schema.iter() {
        let fallback;
        let input = match raw.get(&decl.id) {
            Some(value) => value,
            None => {
                fallback = if decl.kind.is_flag() {
                    RawValue::Flag(false)
                } else {
                    RawValue::text("")
                };
                &fallback
            }
        };

        match validator_for(decl).validate(input) {
            Ok(value) => values.push((decl.id.clone(), value)),
            Err(error) => failures.push(FieldFailure {
                field: decl.id.clone(),
                error,
            }),
        }
    }

    for field in raw.keys().filter(|id| schema.get(id).is_none()) {
        failures.push(FieldFailure {
            field: field.clone(),
            error: FieldError::UnknownField,
        });
    }

    if failures.is_empty() {
        Ok(Record { values })
    } else {
        Err(RecordRejected { failures })
    }
}
