//! Search request and response shapes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use validator::Validate;

use crate::projection::FacetRequest;
use crate::query::RawRule;

/// Deepest result the backend will page to (`offset + limit`)
pub const MAX_RESULT_WINDOW: usize = 10_000;

/// A projected result row: requested column name to value, in column order
pub type Document = Map<String, Value>;

/// Client search request
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SearchRequest {
    /// Filter rules, combined with AND
    #[serde(default)]
    #[validate(length(max = 200))]
    pub rules: Vec<RawRule>,

    #[serde(default)]
    #[validate(length(max = 50))]
    pub facets: Vec<FacetRequest>,

    /// Result columns; empty selects the default columns
    #[serde(default)]
    #[validate(length(max = 200))]
    pub columns: Vec<String>,

    #[serde(default)]
    #[validate(range(max = 10000))]
    pub offset: usize,

    /// Page size; the configured default applies when absent
    #[serde(default)]
    #[validate(range(min = 1))]
    pub limit: Option<usize>,
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: RawRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_facet(mut self, facet: impl Into<FacetRequest>) -> Self {
        self.facets.push(facet.into());
        self
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One facet bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCount {
    /// Distinct value, rendered as text
    pub term: String,
    pub count: u64,
}

/// Effective bounds of the primary date field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Search response with results and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Projected documents in backend order
    pub hits: Vec<Document>,

    /// Total number of matches (before pagination)
    pub total: u64,

    /// Buckets per requested facet
    pub facets: BTreeMap<String, Vec<FacetCount>>,

    /// Date window the search actually covered
    pub date_range: DateRange,

    pub offset: usize,
    pub limit: usize,

    /// Schema snapshot the request was validated against
    pub schema_version: u64,

    /// Execution time in milliseconds
    pub took_ms: u64,
}
