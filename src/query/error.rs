//! Rule validation and compilation errors

use serde::Serialize;
use strum::{AsRefStr, Display};

use super::operator::Operator;
use crate::schema::SemanticType;

/// Classification of a [`QueryError`], used as the wire error kind and as a
/// metrics label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr)]
pub enum ErrorKind {
    UnknownField,
    IllegalOperator,
    TypeMismatch,
    MalformedValue,
    UnsupportedOperator,
    NotFacetable,
}

/// A problem with one rule, facet or column of a search request.
///
/// Validation collects every error it finds instead of stopping at the
/// first, so callers usually deal in `Vec<QueryError>`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("Unknown field '{field}'")]
    UnknownField { field: String },

    #[error("Operator '{operator}' is not allowed on field '{field}' ({reason})")]
    IllegalOperator {
        field: String,
        operator: String,
        reason: String,
    },

    #[error("Value {value} for field '{field}' is not a valid {expected}")]
    TypeMismatch {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Malformed value for field '{field}': {reason}")]
    MalformedValue { field: String, reason: String },

    #[error("Operator '{operator}' cannot be applied to any indexing variant of field '{field}'")]
    UnsupportedOperator { field: String, operator: Operator },

    #[error("Field '{field}' cannot be used as a facet")]
    NotFacetable { field: String },
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::UnknownField { .. } => ErrorKind::UnknownField,
            QueryError::IllegalOperator { .. } => ErrorKind::IllegalOperator,
            QueryError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            QueryError::MalformedValue { .. } => ErrorKind::MalformedValue,
            QueryError::UnsupportedOperator { .. } => ErrorKind::UnsupportedOperator,
            QueryError::NotFacetable { .. } => ErrorKind::NotFacetable,
        }
    }

    /// Field the error refers to
    pub fn field(&self) -> &str {
        match self {
            QueryError::UnknownField { field }
            | QueryError::IllegalOperator { field, .. }
            | QueryError::TypeMismatch { field, .. }
            | QueryError::MalformedValue { field, .. }
            | QueryError::UnsupportedOperator { field, .. }
            | QueryError::NotFacetable { field } => field,
        }
    }

    pub(crate) fn unknown_field(field: &str) -> Self {
        QueryError::UnknownField {
            field: field.to_string(),
        }
    }

    pub(crate) fn illegal(field: &str, operator: &str, semantic_type: SemanticType) -> Self {
        QueryError::IllegalOperator {
            field: field.to_string(),
            operator: operator.to_string(),
            reason: format!("not valid for {} fields", semantic_type),
        }
    }

    pub(crate) fn malformed(field: &str, reason: impl Into<String>) -> Self {
        QueryError::MalformedValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn mismatch(field: &str, value: &serde_json::Value, expected: &str) -> Self {
        QueryError::TypeMismatch {
            field: field.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Serializable form returned to API clients
    pub fn detail(&self) -> ErrorDetail {
        ErrorDetail {
            kind: self.kind(),
            field: self.field().to_string(),
            message: self.to_string(),
        }
    }
}

/// Wire form of a [`QueryError`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub field: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_and_field() {
        let err = QueryError::mismatch("uptime", &json!("abc"), "long");
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(err.field(), "uptime");
        assert_eq!(
            err.to_string(),
            "Value \"abc\" for field 'uptime' is not a valid long"
        );
    }

    #[test]
    fn test_detail_serializes_kind_name() {
        let detail = QueryError::unknown_field("nope").detail();
        let value = serde_json::to_value(&detail).unwrap();
        assert_eq!(value["kind"], "UnknownField");
        assert_eq!(value["field"], "nope");
    }
}
