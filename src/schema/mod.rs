//! Field schema registry
//!
//! The registry is the authoritative catalog of searchable crash-report
//! fields. Every field carries a semantic type and an ordered list of indexing
//! variants; a field indexed both as analyzed text and as an exact keyword
//! (a "multi-field") exposes both variants, and the query compiler picks
//! between them per operator.
//!
//! ```text
//! mapping source (JSON) ──parse──▶ ParsedMapping ──▶ FieldSchema (Arc snapshot)
//!                                                         │
//!                 SchemaRegistry::refresh() swaps ◀───────┘
//! ```
//!
//! # Example
//!
//! ```
//! use crash_query::schema::{SchemaRegistry, SchemaSource};
//!
//! let registry = SchemaRegistry::load(SchemaSource::Bundled).unwrap();
//! let schema = registry.snapshot();
//!
//! let signature = schema.lookup("signature").unwrap();
//! assert!(signature.is_multi_field());
//! assert!(schema.list_facetable_fields().contains(&"product".to_string()));
//! ```

mod date_format;
mod error;
mod field;
mod mapping;
mod registry;

pub use date_format::{DateFormat, DEFAULT_DATE_FORMAT};
pub use error::{SchemaError, SchemaResult};
pub use field::{
    EpochUnit, FieldDefinition, IndexingVariant, NullValue, SemanticType, VariantKind,
};
pub use mapping::{parse_mapping, parse_mapping_str, ParsedMapping};
pub use registry::{FieldSchema, SchemaRegistry, SchemaSource, BUNDLED_MAPPING};
