//! Rule validation and query compilation
//!
//! Client rules go through two stages. [`RuleValidator`] binds each rule to a
//! schema field, checks the operator against the field type and coerces the
//! value. [`QueryCompiler`] then picks the indexing variant every rule is
//! evaluated against and builds a [`CompiledQuery`], which
//! [`ElasticsearchDsl`] renders for the backend.
//!
//! ```
//! use crash_query::query::{ElasticsearchDsl, QueryCompiler, RawRule, RuleValidator};
//! use crash_query::schema::FieldSchema;
//! use serde_json::json;
//!
//! let schema = FieldSchema::bundled().unwrap();
//! let rules = vec![RawRule::new("signature", "contains", json!("OOM"))];
//!
//! let (valid, errors) = RuleValidator::new(&schema).validate(&rules);
//! assert!(errors.is_empty());
//!
//! let query = QueryCompiler::compile(&valid).unwrap();
//! assert_eq!(
//!     ElasticsearchDsl::translate(&query),
//!     json!({ "match": { "signature": { "query": "OOM", "operator": "and" } } })
//! );
//! ```

mod compiler;
mod dsl;
mod error;
mod operator;
mod rule;
mod validator;

pub use compiler::{CompiledQuery, Condition, Predicate, QueryCompiler, QueryNode, RangeBounds};
pub use dsl::ElasticsearchDsl;
pub use error::{ErrorDetail, ErrorKind, QueryError};
pub use operator::{Operator, UnknownOperator};
pub use rule::{RawRule, Scalar, TypedValue, ValidatedRule};
pub use validator::RuleValidator;
