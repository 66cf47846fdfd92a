use thiserror::Error;

/// Content or a schema object failed validation. Nothing is written when
/// this is returned.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("schema validation failed for '{schema_key}'{}: {reason}", property.as_ref().map(|p| format!(" at '{p}'")).unwrap_or_default())]
pub struct SchemaValidationError {
    pub schema_key: String,
    pub property: Option<String>,
    pub reason: String,
}

impl SchemaValidationError {
    pub fn new(schema_key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            schema_key: schema_key.into(),
            property: None,
            reason: reason.into(),
        }
    }

    pub fn at(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }
}

/// Errors from schema registration and lookup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// The schema document does not satisfy the meta-schema.
    #[error("invalid schema: {0}")]
    Invalid(SchemaValidationError),

    /// Content does not satisfy its schema.
    #[error(transparent)]
    Validation(#[from] SchemaValidationError),

    /// A different schema is already registered under the same key and version.
    #[error("schema '{key}' version {version} is already registered with different content")]
    Conflict { key: String, version: String },

    #[error("schema not found: {key}")]
    NotFound { key: String },

    /// A typed accessor's declared schema differs from the registered one.
    #[error("type for '{key}' does not match the registered schema")]
    TypeMismatch { key: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;
