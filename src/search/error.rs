//! Error types for search operations

use crate::error::AppError;
use crate::query::QueryError;
use crate::schema::SchemaError;

use super::backend::BackendError;

/// Result type for search operations
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Errors that can occur while executing a search
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// One or more rules, facets or columns were rejected
    #[error("{}", validation_summary(.0))]
    Validation(Vec<QueryError>),

    /// Request envelope failed validation (paging bounds, list sizes)
    #[error("Invalid search request: {0}")]
    InvalidRequest(String),

    /// Backend could not be reached, timed out or answered with an error
    #[error("Search backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Schema could not be (re)loaded
    #[error("Schema load failure: {0}")]
    SchemaLoadFailure(String),
}

fn validation_summary(errors: &[QueryError]) -> String {
    let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
    format!(
        "Search request has {} invalid part(s): {}",
        errors.len(),
        messages.join("; ")
    )
}

impl SearchError {
    /// Validation errors carried by this error, if any
    pub fn query_errors(&self) -> &[QueryError] {
        match self {
            SearchError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

impl From<BackendError> for SearchError {
    fn from(err: BackendError) -> Self {
        SearchError::BackendUnavailable(err.to_string())
    }
}

impl From<SchemaError> for SearchError {
    fn from(err: SchemaError) -> Self {
        SearchError::SchemaLoadFailure(err.to_string())
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Validation(errors) => AppError::InvalidQuery(errors),
            SearchError::InvalidRequest(msg) => AppError::Validation(msg),
            SearchError::BackendUnavailable(msg) => AppError::BackendUnavailable(msg),
            SearchError::SchemaLoadFailure(msg) => AppError::SchemaLoad(msg),
        }
    }
}
