//! Schema-driven search over processed crash reports.
//!
//! Clients describe a search as filter rules, facets and result columns
//! named by logical field. The crate checks every name, operator and value
//! against a versioned field catalog, compiles the rules into a query tree
//! bound to concrete indexing variants, and answers the search with a single
//! call to the document store.
//!
//! - [`schema`]: field catalog with atomic snapshot swapping
//! - [`query`]: rule validation, compilation and DSL rendering
//! - [`projection`]: facet and column resolution
//! - [`search`]: request planning, the backend trait and the search service
//! - [`api`]: axum HTTP surface

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod projection;
pub mod query;
pub mod schema;
pub mod search;

pub use error::{AppError, Result};
