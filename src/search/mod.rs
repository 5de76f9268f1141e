//! Search request orchestration
//!
//! A search is planned against one schema snapshot and then answered by a
//! single backend call:
//!
//! ```text
//! SearchRequest ─▶ SearchPlanner ─┬─ RuleValidator ─▶ QueryCompiler ─┐
//!                                 └─ ProjectionResolver ─────────────┴─▶ BackendRequest
//!                                                                              │
//! SearchResponse ◀── column projection, facet buckets ◀── SearchBackend::search┘
//! ```
//!
//! Any rejected rule, facet or column fails the whole request with every
//! problem listed, before the backend is contacted. Backend failures and
//! timeouts surface as [`SearchError::BackendUnavailable`] and are never
//! retried.
//!
//! # Example
//!
//! ```no_run
//! use crash_query::query::RawRule;
//! use crash_query::schema::{SchemaRegistry, SchemaSource};
//! use crash_query::search::{
//!     ElasticsearchBackend, ElasticsearchConfig, SearchConfig, SearchRequest, SearchService,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(SchemaRegistry::load(SchemaSource::Bundled)?);
//!     let backend = Arc::new(ElasticsearchBackend::new(ElasticsearchConfig::default())?);
//!     let service = SearchService::new(registry, backend, SearchConfig::default());
//!
//!     let request = SearchRequest::new()
//!         .with_rule(RawRule::new("signature", "contains", json!("OOM")))
//!         .with_facet("product")
//!         .with_limit(20);
//!
//!     let results = service.execute(&request).await?;
//!     println!("Found {} crashes", results.total);
//!
//!     Ok(())
//! }
//! ```

mod backend;
mod config;
mod elasticsearch;
mod error;
mod planner;
mod request;
mod service;

pub use backend::{
    BackendError, BackendRequest, BackendResponse, SearchBackend, SortKey, SortOrder,
};
pub use config::{SearchConfig, SearchConfigBuilder};
pub use elasticsearch::{ElasticsearchBackend, ElasticsearchConfig};
pub use error::{SearchError, SearchResult};
pub use planner::{SearchPlan, SearchPlanner};
pub use request::{
    DateRange, Document, FacetCount, SearchRequest, SearchResponse, MAX_RESULT_WINDOW,
};
pub use service::SearchService;
