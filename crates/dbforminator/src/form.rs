//! Headless form: field templates for renderers and raw input assembly.

use anyhow::{bail, Result};
use chrono::NaiveDateTime;
use dbforminator_schema::{
    blank_value, initial_value, validator_for, FieldConstraint, RawRecord, RawValue, Schema,
};
use serde::Serialize;

/// Everything a renderer needs to draw one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldTemplate {
    pub id: String,
    pub label: String,
    pub constraint: FieldConstraint,
    pub initial: RawValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

/// Templates in display order, with initial values as of `now`.
pub fn templates(schema: &Schema, now: NaiveDateTime) -> Vec<FieldTemplate> {
    schema
        .iter()
        .map(|decl| FieldTemplate {
            id: decl.id.clone(),
            label: decl.label.clone(),
            constraint: validator_for(decl).constraint(),
            initial: initial_value(decl, now),
            placeholder: decl.placeholder.clone(),
        })
        .collect()
}

/// Form contents right after it is shown.
pub fn prefilled(schema: &Schema, now: NaiveDateTime) -> RawRecord {
    schema
        .iter()
        .map(|decl| (decl.id.clone(), initial_value(decl, now)))
        .collect()
}

/// Form contents after "Clear".
pub fn cleared(schema: &Schema) -> RawRecord {
    schema
        .iter()
        .map(|decl| (decl.id.clone(), blank_value(decl)))
        .collect()
}

/// Apply `id=value` assignments on top of `base`.
///
/// Toggle fields take `true/false`, `yes/no`, `on/off` or `1/0`. Ids the
/// schema does not know are kept as text so validation reports them.
pub fn apply_assignments(schema: &Schema, mut base: RawRecord, assignments: &[String]) -> Result<RawRecord> {
    for assignment in assignments {
        let Some((id, value)) = assignment.split_once('=') else {
            bail!("Expected id=value, got '{}'", assignment);
        };
        let id = id.trim();
        if id.is_empty() {
            bail!("Missing field id in '{}'", assignment);
        }

        let raw = match schema.get(id) {
            Some(decl) if decl.kind.is_flag() => RawValue::Flag(parse_flag(id, value)?),
            _ => RawValue::text(value),
        };
        base.insert(id.to_string(), raw);
    }
    Ok(base)
}

fn parse_flag(id: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" | "" => Ok(false),
        other => bail!("Field '{}' is a toggle; expected true or false, got '{}'", id, other),
    }
}
