//! Schema Validator.
//!
//! Normalizes a raw schema document (an ordered list of field declarations)
//! into an immutable [`Schema`]. Checks run in a fixed order:
//!
//! 1. the document is a non-empty sequence of declarations
//! 2. every declaration has a usable `id` and a recognized `type`
//! 3. ids are pairwise unique
//! 4. numeric constraints and defaults are valid
//!
//! A failure here is fatal; there is no degraded mode.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Result, SchemaError};
use crate::types::{
    validator_for, FieldKind, RawValue, TypeName, DEFAULT_MAX_LENGTH, DEFAULT_PRECISION,
    MAX_PRECISION,
};

/// Name of the synthetic primary key column when none is configured.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Longest identifier accepted for columns and tables.
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// One form field and its destination column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDeclaration {
    /// Stable key, also the destination column name
    pub id: String,
    /// Display label (presentation only)
    pub label: String,
    /// Declared type with its constraints
    pub kind: FieldKind,
    /// Declared default, already checked against the field's validator
    pub default: Option<RawValue>,
    /// Placeholder text (presentation only)
    pub placeholder: Option<String>,
}

/// Options that change how a schema document is normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaOptions {
    /// Keep unrecognized types as permissive text fields instead of failing
    pub allow_unknown_types: bool,
    /// Column name reserved for the synthetic primary key
    pub primary_key: String,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            allow_unknown_types: false,
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
        }
    }
}

/// An ordered, validated set of field declarations.
///
/// Order fixes both display order and insert column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schema {
    fields: Vec<FieldDeclaration>,
}

impl Schema {
    pub fn fields(&self) -> &[FieldDeclaration] {
        &self.fields
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDeclaration> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Look up a declaration by id.
    pub fn get(&self, id: &str) -> Option<&FieldDeclaration> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Field ids in declaration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.id.as_str())
    }

    /// Render back into a schema document that normalizes to `self`.
    pub fn to_document(&self) -> Value {
        Value::Array(self.fields.iter().map(declaration_to_document).collect())
    }
}

fn declaration_to_document(decl: &FieldDeclaration) -> Value {
    let mut map = Map::new();
    map.insert("id".to_string(), Value::from(decl.id.clone()));
    map.insert("label".to_string(), Value::from(decl.label.clone()));
    map.insert("type".to_string(), Value::from(decl.kind.type_name()));
    match &decl.kind {
        FieldKind::Varchar { max_length } => {
            map.insert("max_length".to_string(), Value::from(*max_length));
        }
        FieldKind::Decimal { precision } => {
            map.insert("precision".to_string(), Value::from(*precision));
        }
        _ => {}
    }
    if let Some(default) = &decl.default {
        let value = match default {
            RawValue::Flag(v) => Value::Bool(*v),
            RawValue::Text(v) => Value::String(v.clone()),
        };
        map.insert("default".to_string(), value);
    }
    if let Some(placeholder) = &decl.placeholder {
        map.insert("placeholder".to_string(), Value::from(placeholder.clone()));
    }
    Value::Object(map)
}

/// Whether `name` can be used unquoted-safe as a column or table identifier.
///
/// ASCII letter or `_`, then ASCII alphanumerics or `_`.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= MAX_IDENTIFIER_LEN && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Declaration after the structural pass, before constraints are read.
struct Shaped<'a> {
    id: String,
    type_name: Option<TypeName>,
    declared_type: String,
    body: &'a Map<String, Value>,
}

/// Normalize a raw schema document into a [`Schema`].
pub fn normalize(document: &Value, options: &SchemaOptions) -> Result<Schema> {
    let declarations = match document.as_array() {
        Some(items) if !items.is_empty() => items,
        _ => return Err(SchemaError::EmptySchema),
    };

    let mut shaped = Vec::with_capacity(declarations.len());
    for (index, item) in declarations.iter().enumerate() {
        shaped.push(shape_declaration(index, item, options)?);
    }

    // Column names are case-insensitive in both backends.
    let mut seen = HashSet::with_capacity(shaped.len());
    for decl in &shaped {
        if !seen.insert(decl.id.to_ascii_lowercase()) {
            return Err(SchemaError::DuplicateFieldId {
                id: decl.id.clone(),
            });
        }
    }

    let fields = shaped
        .into_iter()
        .map(build_declaration)
        .collect::<Result<Vec<_>>>()?;

    debug!(fields = fields.len(), "Schema normalized");
    Ok(Schema { fields })
}

fn shape_declaration<'a>(
    index: usize,
    item: &'a Value,
    options: &SchemaOptions,
) -> Result<Shaped<'a>> {
    let body = item
        .as_object()
        .ok_or(SchemaError::MalformedDeclaration { index })?;

    let id = non_blank_str(body, "id")
        .ok_or(SchemaError::MissingField { index, field: "id" })?
        .to_string();
    let declared_type = non_blank_str(body, "type")
        .ok_or(SchemaError::MissingField {
            index,
            field: "type",
        })?
        .to_string();

    let type_name = TypeName::parse(&declared_type);
    if type_name.is_none() && !options.allow_unknown_types {
        return Err(SchemaError::UnknownType { id, declared: declared_type });
    }

    if !is_valid_identifier(&id) {
        return Err(SchemaError::InvalidFieldId { id });
    }
    if id.eq_ignore_ascii_case(&options.primary_key) {
        return Err(SchemaError::ReservedFieldId { id });
    }

    Ok(Shaped {
        id,
        type_name,
        declared_type,
        body,
    })
}

fn build_declaration(shaped: Shaped<'_>) -> Result<FieldDeclaration> {
    let Shaped {
        id,
        type_name,
        declared_type,
        body,
    } = shaped;

    let max_length = read_constraint(&id, body, "max_length")?;
    let precision = read_constraint(&id, body, "precision")?;

    let kind = match type_name {
        Some(TypeName::Varchar) => {
            let max_length = max_length.unwrap_or(DEFAULT_MAX_LENGTH);
            if max_length == 0 {
                return Err(SchemaError::invalid_constraint(
                    &id,
                    "max_length",
                    "must be positive",
                ));
            }
            FieldKind::Varchar { max_length }
        }
        Some(TypeName::Decimal) => {
            let precision = precision.unwrap_or(DEFAULT_PRECISION);
            if precision > MAX_PRECISION {
                return Err(SchemaError::invalid_constraint(
                    &id,
                    "precision",
                    format!("must be at most {}", MAX_PRECISION),
                ));
            }
            FieldKind::Decimal { precision }
        }
        Some(TypeName::Integer) => FieldKind::Integer,
        Some(TypeName::DateTime) => FieldKind::DateTime,
        Some(TypeName::Boolean) => FieldKind::Boolean,
        None => {
            warn!(field = %id, declared = %declared_type, "Unknown field type kept as permissive text");
            FieldKind::Unknown {
                declared: declared_type,
            }
        }
    };

    if max_length.is_some() && !matches!(kind, FieldKind::Varchar { .. }) {
        warn!(field = %id, "max_length ignored for {} field", kind.type_name());
    }
    if precision.is_some() && !matches!(kind, FieldKind::Decimal { .. }) {
        warn!(field = %id, "precision ignored for {} field", kind.type_name());
    }

    let label = non_blank_str(body, "label")
        .map(str::to_string)
        .unwrap_or_else(|| id.clone());
    let placeholder = body
        .get("placeholder")
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut decl = FieldDeclaration {
        id,
        label,
        kind,
        default: None,
        placeholder,
    };
    decl.default = read_default(&decl, body)?;
    Ok(decl)
}

fn non_blank_str<'a>(body: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn read_constraint(
    id: &str,
    body: &Map<String, Value>,
    constraint: &'static str,
) -> Result<Option<u32>> {
    let value = match body.get(constraint) {
        None | Some(Value::Null) => return Ok(None),
        Some(value) => value,
    };

    let parsed = match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                v
            } else if n.as_i64().is_some() {
                return Err(SchemaError::invalid_constraint(
                    id,
                    constraint,
                    "must be non-negative",
                ));
            } else {
                return Err(SchemaError::invalid_constraint(
                    id,
                    constraint,
                    format!("{} is not an integer", n),
                ));
            }
        }
        Value::String(s) => s.trim().parse::<u64>().map_err(|_| {
            SchemaError::invalid_constraint(id, constraint, format!("'{}' is not an integer", s))
        })?,
        other => {
            return Err(SchemaError::invalid_constraint(
                id,
                constraint,
                format!("{} is not an integer", other),
            ))
        }
    };

    u32::try_from(parsed)
        .map(Some)
        .map_err(|_| SchemaError::invalid_constraint(id, constraint, "is too large"))
}

fn read_default(decl: &FieldDeclaration, body: &Map<String, Value>) -> Result<Option<RawValue>> {
    let raw = match body.get("default") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Bool(v)) => RawValue::Flag(*v),
        Some(Value::String(s)) => RawValue::Text(s.clone()),
        Some(Value::Number(n)) => RawValue::Text(n.to_string()),
        Some(other) => {
            return Err(SchemaError::InvalidDefault {
                id: decl.id.clone(),
                reason: format!("{} is not a scalar", other),
            })
        }
    };

    validator_for(decl)
        .validate(&raw)
        .map_err(|e| SchemaError::InvalidDefault {
            id: decl.id.clone(),
            reason: e.to_string(),
        })?;
    Ok(Some(raw))
}
