//! Search backend abstraction

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::request::FacetCount;
use crate::projection::{ColumnSpec, FacetSpec};
use crate::query::{CompiledQuery, QueryNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Result ordering
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub path: String,
    pub order: SortOrder,
}

/// Everything the backend needs to answer one search, in backend-neutral
/// form. A backend renders this into its own wire format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendRequest {
    /// Compiled client rules
    pub query: CompiledQuery,

    /// Defaulted date bounds, applied as a non-scoring filter
    pub date_filter: Option<QueryNode>,

    pub facets: Vec<FacetSpec>,
    pub columns: Vec<ColumnSpec>,
    pub sort: Option<SortKey>,
    pub from: usize,
    pub size: usize,
}

/// Raw backend answer, before column projection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendResponse {
    pub total: u64,

    /// Stored documents of the returned page
    pub hits: Vec<Value>,

    /// Buckets keyed by facet name
    pub facets: BTreeMap<String, Vec<FacetCount>>,
}

/// Failures talking to a backend
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode backend response: {0}")]
    Decode(String),
}

/// A document store able to answer compiled searches.
///
/// Implementations make exactly one outbound call per `search` and never
/// retry; dropping the returned future must abandon the call.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Short name used in logs and metrics
    fn name(&self) -> &str;

    async fn search(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError>;

    /// Cheap reachability probe
    async fn ping(&self) -> Result<(), BackendError>;
}
