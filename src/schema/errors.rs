//! Schema error types
//!
//! Validation failures report only the first violation found, as
//! `<path>: <message>`, with `(root)` standing for the document itself.

use std::fmt;

use thiserror::Error;

use crate::storage::StorageError;

/// Path label used for the document root
pub const ROOT_PATH: &str = "(root)";

/// Where a document broke its schema, and how
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationDetails {
    /// Dotted path to the offending value, `(root)` for the top level
    pub field: String,
    pub message: String,
}

impl ValidationDetails {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn missing_field(parent: &str, field: &str) -> Self {
        Self::new(parent, format!("{} is required", field))
    }

    pub fn type_mismatch(field: &str, expected: &str, actual: &str) -> Self {
        Self::new(
            field,
            format!("Invalid type. Expected: {}, given: {}", expected, actual),
        )
    }

    pub fn additional_property(parent: &str, property: &str) -> Self {
        Self::new(parent, format!("Additional property {} is not allowed", property))
    }
}

impl fmt::Display for ValidationDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Schema error type
#[derive(Debug, Clone, Error)]
pub enum SchemaError {
    /// Payload is not JSON at all
    #[error("invalid JSON: {0}")]
    MalformedJson(String),

    /// Payload is JSON but breaks the namespace schema
    #[error("{0}")]
    Violation(ValidationDetails),

    /// A schema document that cannot be compiled
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Registry read or write failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SchemaError {
    pub fn invalid_schema(reason: impl Into<String>) -> Self {
        SchemaError::InvalidSchema(reason.into())
    }

    /// Violation details, if this is a validation failure
    pub fn details(&self) -> Option<&ValidationDetails> {
        match self {
            SchemaError::Violation(details) => Some(details),
            _ => None,
        }
    }

    /// Whether the client sent something unacceptable
    pub fn is_client_error(&self) -> bool {
        !matches!(self, SchemaError::Storage(_))
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> u16 {
        match self {
            SchemaError::MalformedJson(_)
            | SchemaError::Violation(_)
            | SchemaError::InvalidSchema(_) => 400,
            SchemaError::Storage(e) => e.status_code(),
        }
    }
}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
