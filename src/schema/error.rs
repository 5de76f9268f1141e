//! Error types for schema loading

/// Result type for schema operations
pub type SchemaResult<T> = std::result::Result<T, SchemaError>;

/// Errors raised while loading a schema source. Any of these leaves the
/// registry without a usable snapshot, so they all surface as a schema load
/// failure.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Source could not be read
    #[error("Failed to read schema source {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Source is not valid JSON
    #[error("Schema source is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Source is JSON but not a mapping we understand
    #[error("Invalid mapping structure: {0}")]
    InvalidStructure(String),

    /// A single field entry is malformed
    #[error("Invalid definition for field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    /// `_meta.default_columns` names a field that is not declared
    #[error("Default column '{0}' is not a declared field")]
    UnknownDefaultColumn(String),
}

impl SchemaError {
    pub(crate) fn field(field: &str, reason: impl Into<String>) -> Self {
        SchemaError::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
