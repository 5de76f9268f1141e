use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::query::QueryError;
use crate::schema::SchemaError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed request envelope
    #[error("Validation error: {0}")]
    Validation(String),

    /// Rejected rules, facets or columns
    #[error("Invalid query: {}", summarize(.0))]
    InvalidQuery(Vec<QueryError>),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Search backend unreachable, failing or too slow
    #[error("Search backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Schema could not be loaded or refreshed
    #[error("Schema load failure: {0}")]
    SchemaLoad(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

fn summarize(errors: &[QueryError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl AppError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::SchemaLoad(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::InvalidQuery(_) => "INVALID_QUERY",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::BackendUnavailable(_) => "BACKEND_UNAVAILABLE",
            AppError::SchemaLoad(_) => "SCHEMA_LOAD_FAILURE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Per-item problems, for errors that carry them
    pub fn details(&self) -> Option<Value> {
        match self {
            AppError::InvalidQuery(errors) => {
                let details: Vec<_> = errors.iter().map(QueryError::detail).collect();
                serde_json::to_value(details).ok()
            }
            _ => None,
        }
    }
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(
                error_code = error_code,
                status_code = status.as_u16(),
                message = %message,
                "Request error"
            );
        } else {
            tracing::warn!(
                error_code = error_code,
                status_code = status.as_u16(),
                message = %message,
                "Request rejected"
            );
        }

        let mut error = json!({
            "code": error_code,
            "message": message,
            "status": status.as_u16(),
        });
        if let Some(details) = self.details() {
            error["details"] = details;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Conversion from SchemaError
impl From<SchemaError> for AppError {
    fn from(err: SchemaError) -> Self {
        AppError::SchemaLoad(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
