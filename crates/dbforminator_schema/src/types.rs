//! Field Type Registry.
//!
//! Maps a declared logical type to a storage column type, a value validator,
//! and a default-value policy. Every field kind is a variant of [`FieldKind`];
//! constraints that only make sense for one kind live inside that variant.

use std::str::FromStr;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::FieldDeclaration;

/// Column width used for VARCHAR fields without an explicit `max_length`.
pub const DEFAULT_MAX_LENGTH: u32 = 255;

/// Fractional digits allowed for DECIMAL fields without an explicit `precision`.
pub const DEFAULT_PRECISION: u32 = 2;

/// Largest `precision` a DECIMAL field may declare (the scale limit of `rust_decimal`).
pub const MAX_PRECISION: u32 = 28;

/// Total digits of the fixed-point column backing DECIMAL fields.
pub const DECIMAL_TOTAL_DIGITS: u32 = 38;

/// Format of the DATETIME initial value.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Declared logical type of a field, with its kind-specific constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// Bounded text.
    Varchar { max_length: u32 },
    /// Whole number, digits only.
    Integer,
    /// Fixed-point number with at most `precision` fractional digits.
    Decimal { precision: u32 },
    /// Timestamp; content is free text.
    DateTime,
    /// Two-state flag.
    Boolean,
    /// Unrecognized declared type, kept only in permissive mode.
    Unknown { declared: String },
}

impl FieldKind {
    /// Canonical declared type name, as written in a schema document.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Varchar { .. } => "VARCHAR",
            Self::Integer => "INTEGER",
            Self::Decimal { .. } => "DECIMAL",
            Self::DateTime => "DATETIME",
            Self::Boolean => "BOOLEAN",
            Self::Unknown { declared } => declared,
        }
    }

    /// Whether values of this kind come from a toggle instead of free text.
    pub fn is_flag(&self) -> bool {
        matches!(self, Self::Boolean)
    }
}

/// Recognized declared type names, without their constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeName {
    Varchar,
    Integer,
    Decimal,
    DateTime,
    Boolean,
}

impl TypeName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Varchar => "VARCHAR",
            Self::Integer => "INTEGER",
            Self::Decimal => "DECIMAL",
            Self::DateTime => "DATETIME",
            Self::Boolean => "BOOLEAN",
        }
    }

    /// Parse a declared type name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VARCHAR" => Some(Self::Varchar),
            "INTEGER" => Some(Self::Integer),
            "DECIMAL" => Some(Self::Decimal),
            "DATETIME" => Some(Self::DateTime),
            "BOOLEAN" => Some(Self::Boolean),
            _ => None,
        }
    }
}

impl std::fmt::Display for TypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Backend-neutral storage column type for a field.
///
/// Rendering into a concrete SQL dialect happens in the storage layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageType {
    /// Bounded character column.
    Varchar { length: u32 },
    /// Whole-number column.
    Integer,
    /// Fixed-point numeric column.
    Decimal { digits: u32, scale: u32 },
    /// Timestamp column.
    Timestamp,
    /// Boolean column.
    Boolean,
}

/// Storage column type for a field declaration.
///
/// Unknown kinds fall back to `VARCHAR(255)`.
pub fn column_type_for(decl: &FieldDeclaration) -> StorageType {
    match &decl.kind {
        FieldKind::Varchar { max_length } => StorageType::Varchar {
            length: *max_length,
        },
        FieldKind::Integer => StorageType::Integer,
        FieldKind::Decimal { precision } => StorageType::Decimal {
            digits: DECIMAL_TOTAL_DIGITS,
            scale: *precision,
        },
        FieldKind::DateTime => StorageType::Timestamp,
        FieldKind::Boolean => StorageType::Boolean,
        FieldKind::Unknown { .. } => StorageType::Varchar {
            length: DEFAULT_MAX_LENGTH,
        },
    }
}

/// Value produced by the presentation layer for one field.
///
/// Text widgets produce [`RawValue::Text`], toggles produce [`RawValue::Flag`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Flag(bool),
    Text(String),
}

impl RawValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<bool> for RawValue {
    fn from(v: bool) -> Self {
        Self::Flag(v)
    }
}

impl std::fmt::Display for RawValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flag(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{}", v),
        }
    }
}

/// Typed value of one validated field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// No value entered (empty numeric or datetime input).
    Null,
    Text(String),
    Integer(i64),
    Decimal(Decimal),
    /// Free-text timestamp as entered.
    DateTime(String),
    Boolean(bool),
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Text(v) | Self::DateTime(v) => write!(f, "{}", v),
            Self::Integer(v) => write!(f, "{}", v),
            Self::Decimal(v) => write!(f, "{}", v),
            Self::Boolean(v) => write!(f, "{}", v),
        }
    }
}

/// Why one field's raw value was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum FieldError {
    #[error("value has {length} characters, at most {max_length} allowed")]
    ValueTooLong { length: usize, max_length: u32 },

    #[error("'{value}' is not a whole number (digits only)")]
    NotAnInteger { value: String },

    #[error("'{value}' does not fit in a 64-bit integer")]
    IntegerOutOfRange { value: String },

    #[error("'{value}' is not a number")]
    NotANumber { value: String },

    #[error("'{value}' has {scale} fractional digits, at most {precision} allowed")]
    PrecisionExceeded {
        value: String,
        scale: usize,
        precision: u32,
    },

    #[error("expected {expected} input, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("field is not part of the schema")]
    UnknownField,
}

/// Constraint description handed to renderers for live input feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConstraint {
    /// Declared type name.
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    /// Whether an empty entry is acceptable.
    pub allows_empty: bool,
    /// Whether the entry mechanism is a toggle.
    pub toggle: bool,
}

/// Per-field validator derived from a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValidator {
    kind: FieldKind,
}

/// Validator for a field declaration.
pub fn validator_for(decl: &FieldDeclaration) -> FieldValidator {
    FieldValidator {
        kind: decl.kind.clone(),
    }
}

impl FieldValidator {
    pub fn new(kind: FieldKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Validate a complete raw value into a typed value.
    ///
    /// No coercion happens beyond what each kind defines: over-long text is
    /// rejected, never truncated.
    pub fn validate(&self, raw: &RawValue) -> Result<FieldValue, FieldError> {
        match (&self.kind, raw) {
            (FieldKind::Boolean, RawValue::Flag(v)) => Ok(FieldValue::Boolean(*v)),
            (FieldKind::Boolean, RawValue::Text(_)) => Err(FieldError::TypeMismatch {
                expected: "toggle".to_string(),
                got: "text".to_string(),
            }),
            (_, RawValue::Flag(_)) => Err(FieldError::TypeMismatch {
                expected: "text".to_string(),
                got: "toggle".to_string(),
            }),
            (kind, RawValue::Text(text)) => validate_text(kind, text),
        }
    }

    /// Keystroke-level predicate: would the widget accept `input` as its new content?
    pub fn accepts(&self, input: &str) -> bool {
        match &self.kind {
            FieldKind::Boolean => false,
            kind => validate_text(kind, input).is_ok(),
        }
    }

    /// Constraint description for renderers.
    pub fn constraint(&self) -> FieldConstraint {
        let (max_length, precision) = match &self.kind {
            FieldKind::Varchar { max_length } => (Some(*max_length), None),
            FieldKind::Decimal { precision } => (None, Some(*precision)),
            _ => (None, None),
        };
        FieldConstraint {
            type_name: self.kind.type_name().to_string(),
            max_length,
            precision,
            allows_empty: !self.kind.is_flag(),
            toggle: self.kind.is_flag(),
        }
    }
}

fn validate_text(kind: &FieldKind, text: &str) -> Result<FieldValue, FieldError> {
    match kind {
        FieldKind::Varchar { max_length } => {
            let length = text.chars().count();
            if length > *max_length as usize {
                return Err(FieldError::ValueTooLong {
                    length,
                    max_length: *max_length,
                });
            }
            Ok(FieldValue::Text(text.to_string()))
        }
        FieldKind::Integer => parse_integer(text),
        FieldKind::Decimal { precision } => parse_decimal(text, *precision),
        FieldKind::DateTime => {
            if text.is_empty() {
                Ok(FieldValue::Null)
            } else {
                Ok(FieldValue::DateTime(text.to_string()))
            }
        }
        FieldKind::Unknown { .. } => Ok(FieldValue::Text(text.to_string())),
        FieldKind::Boolean => Err(FieldError::TypeMismatch {
            expected: "toggle".to_string(),
            got: "text".to_string(),
        }),
    }
}

fn parse_integer(text: &str) -> Result<FieldValue, FieldError> {
    if text.is_empty() {
        return Ok(FieldValue::Null);
    }
    if !text.chars().all(|c| c.is_ascii_digit()) {
        return Err(FieldError::NotAnInteger {
            value: text.to_string(),
        });
    }
    text.parse::<i64>()
        .map(FieldValue::Integer)
        .map_err(|_| FieldError::IntegerOutOfRange {
            value: text.to_string(),
        })
}

fn parse_decimal(text: &str, precision: u32) -> Result<FieldValue, FieldError> {
    if text.is_empty() {
        return Ok(FieldValue::Null);
    }
    let not_a_number = || FieldError::NotANumber {
        value: text.to_string(),
    };

    let parsed = text.parse::<f64>().map_err(|_| not_a_number())?;
    if !parsed.is_finite() {
        return Err(not_a_number());
    }

    let scale = fractional_digits(text);
    if scale > precision as usize {
        return Err(FieldError::PrecisionExceeded {
            value: text.to_string(),
            scale,
            precision,
        });
    }

    let value = Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .or_else(|_| Decimal::try_from(parsed))
        .map_err(|_| not_a_number())?;
    Ok(FieldValue::Decimal(value))
}

/// Digits between the decimal point and any exponent marker.
fn fractional_digits(text: &str) -> usize {
    let mantissa = text.split(['e', 'E']).next().unwrap_or(text);
    match mantissa.split_once('.') {
        Some((_, fraction)) => fraction.chars().filter(|c| c.is_ascii_digit()).count(),
        None => 0,
    }
}

/// Initial widget value for a field when the form is shown.
///
/// DATETIME fields start at `now`; the user may edit it afterwards.
pub fn initial_value(decl: &FieldDeclaration, now: NaiveDateTime) -> RawValue {
    match &decl.kind {
        FieldKind::DateTime => RawValue::Text(now.format(DATETIME_FORMAT).to_string()),
        FieldKind::Boolean => decl.default.clone().unwrap_or(RawValue::Flag(false)),
        _ => decl.default.clone().unwrap_or_else(|| RawValue::text("")),
    }
}

/// Value a widget resets to when the form is cleared.
pub fn blank_value(decl: &FieldDeclaration) -> RawValue {
    if decl.kind.is_flag() {
        RawValue::Flag(false)
    } else {
        RawValue::text("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn varchar(max_length: u32) -> FieldValidator {
        FieldValidator::new(FieldKind::Varchar { max_length })
    }

    fn decimal(precision: u32) -> FieldValidator {
        FieldValidator::new(FieldKind::Decimal { precision })
    }

    #[test]
    fn test_type_name_parse() {
        assert_eq!(TypeName::parse("VARCHAR"), Some(TypeName::Varchar));
        assert_eq!(TypeName::parse("datetime"), Some(TypeName::DateTime));
        assert_eq!(TypeName::parse("TEXT"), None);
    }

    #[test]
    fn test_varchar_length_boundary() {
        let v = varchar(5);
        assert_eq!(
            v.validate(&RawValue::text("abcde")).unwrap(),
            FieldValue::Text("abcde".to_string())
        );
        assert_eq!(
            v.validate(&RawValue::text("abcdef")).unwrap_err(),
            FieldError::ValueTooLong {
                length: 6,
                max_length: 5
            }
        );
    }

    #[test]
    fn test_varchar_counts_characters_not_bytes() {
        let v = varchar(3);
        assert!(v.validate(&RawValue::text("äöü")).is_ok());
    }

    #[test]
    fn test_integer_validation() {
        let v = FieldValidator::new(FieldKind::Integer);
        assert_eq!(v.validate(&"".into()).unwrap(), FieldValue::Null);
        assert_eq!(v.validate(&"0".into()).unwrap(), FieldValue::Integer(0));
        assert_eq!(
            v.validate(&"12345".into()).unwrap(),
            FieldValue::Integer(12345)
        );
        for bad in ["12.3", "-5", "abc", " 1"] {
            assert!(
                matches!(v.validate(&bad.into()), Err(FieldError::NotAnInteger { .. })),
                "{bad} should be rejected"
            );
        }
        assert!(matches!(
            v.validate(&"99999999999999999999".into()),
            Err(FieldError::IntegerOutOfRange { .. })
        ));
    }

    #[test]
    fn test_decimal_validation() {
        let v = decimal(2);
        assert_eq!(
            v.validate(&"3.14".into()).unwrap(),
            FieldValue::Decimal(Decimal::new(314, 2))
        );
        assert_eq!(v.validate(&"".into()).unwrap(), FieldValue::Null);
        assert!(matches!(
            v.validate(&"3.141".into()),
            Err(FieldError::PrecisionExceeded { scale: 3, .. })
        ));
        assert!(matches!(
            v.validate(&"abc".into()),
            Err(FieldError::NotANumber { .. })
        ));
        assert!(matches!(
            v.validate(&"inf".into()),
            Err(FieldError::NotANumber { .. })
        ));
    }

    #[test]
    fn test_decimal_whole_numbers_have_no_fraction() {
        let v = decimal(2);
        assert_eq!(
            v.validate(&"12345".into()).unwrap(),
            FieldValue::Decimal(Decimal::new(12345, 0))
        );
        assert!(v.validate(&"-7.5".into()).is_ok());
        assert!(v.validate(&"1.5e3".into()).is_ok());
    }

    #[test]
    fn test_boolean_rejects_text() {
        let v = FieldValidator::new(FieldKind::Boolean);
        assert_eq!(v.validate(&true.into()).unwrap(), FieldValue::Boolean(true));
        assert!(matches!(
            v.validate(&"true".into()),
            Err(FieldError::TypeMismatch { .. })
        ));
        assert!(matches!(
            varchar(10).validate(&false.into()),
            Err(FieldError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_datetime_accepts_free_text() {
        let v = FieldValidator::new(FieldKind::DateTime);
        assert_eq!(
            v.validate(&"next tuesday".into()).unwrap(),
            FieldValue::DateTime("next tuesday".to_string())
        );
        assert_eq!(v.validate(&"".into()).unwrap(), FieldValue::Null);
    }

    #[test]
    fn test_accepts_for_keystrokes() {
        assert!(varchar(3).accepts("abc"));
        assert!(!varchar(3).accepts("abcd"));
        assert!(FieldValidator::new(FieldKind::Integer).accepts(""));
        assert!(!FieldValidator::new(FieldKind::Integer).accepts("1a"));
        assert!(decimal(1).accepts("2.5"));
        assert!(!decimal(1).accepts("2.55"));
    }

    #[test]
    fn test_constraint_description() {
        let c = varchar(40).constraint();
        assert_eq!(c.type_name, "VARCHAR");
        assert_eq!(c.max_length, Some(40));
        assert!(c.allows_empty);
        assert!(!c.toggle);

        let c = FieldValidator::new(FieldKind::Boolean).constraint();
        assert!(c.toggle);
    }

    #[test]
    fn test_fractional_digits() {
        assert_eq!(fractional_digits("3.14"), 2);
        assert_eq!(fractional_digits("3."), 0);
        assert_eq!(fractional_digits("42"), 0);
        assert_eq!(fractional_digits("1.25E4"), 2);
    }
}
