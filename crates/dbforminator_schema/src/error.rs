//! Startup-time schema errors.

use thiserror::Error;

/// Schema normalization result type.
pub type Result<T> = std::result::Result<T, SchemaError>;

/// A schema document that cannot be turned into a [`Schema`](crate::Schema).
///
/// Always fatal: the process must not proceed to form display.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The document is not a non-empty sequence of declarations
    #[error("Schema is empty or not a list of field declarations")]
    EmptySchema,

    /// A declaration is not a mapping
    #[error("Field declaration #{index} is not a mapping")]
    MalformedDeclaration { index: usize },

    /// A required key is missing or blank
    #[error("Field declaration #{index} is missing '{field}'")]
    MissingField { index: usize, field: &'static str },

    /// The declared type is not recognized
    #[error("Field '{id}' has unknown type '{declared}'")]
    UnknownType { id: String, declared: String },

    /// The id is not a usable column identifier
    #[error("Field id '{id}' is not a valid column identifier")]
    InvalidFieldId { id: String },

    /// The id collides with the synthetic primary key column
    #[error("Field id '{id}' is reserved for the primary key column")]
    ReservedFieldId { id: String },

    /// Two declarations share an id
    #[error("Field id '{id}' is declared more than once")]
    DuplicateFieldId { id: String },

    /// A numeric constraint is out of range or not an integer
    #[error("Field '{id}' has invalid {constraint}: {reason}")]
    InvalidConstraint {
        id: String,
        constraint: &'static str,
        reason: String,
    },

    /// The declared default fails the field's own validator
    #[error("Field '{id}' has invalid default: {reason}")]
    InvalidDefault { id: String, reason: String },
}

impl SchemaError {
    pub(crate) fn invalid_constraint(
        id: &str,
        constraint: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidConstraint {
            id: id.to_string(),
            constraint,
            reason: reason.into(),
        }
    }
}
