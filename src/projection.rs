//! Facet and result-column resolution
//!
//! Requested facet and column names are mapped to the backend path each one
//! reads from. Facets must aggregate on a verbatim variant; columns read from
//! the stored document, where a dynamic object is projected as a whole
//! sub-document.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::query::QueryError;
use crate::schema::FieldSchema;

/// A facet as requested by a client: a bare field name or `{field, size}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FacetRequestRepr")]
pub struct FacetRequest {
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FacetRequestRepr {
    Name(String),
    Sized { field: String, size: Option<usize> },
}

impl From<FacetRequestRepr> for FacetRequest {
    fn from(repr: FacetRequestRepr) -> Self {
        match repr {
            FacetRequestRepr::Name(field) => Self { field, size: None },
            FacetRequestRepr::Sized { field, size } => Self { field, size },
        }
    }
}

impl FacetRequest {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            size: None,
        }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }
}

impl From<&str> for FacetRequest {
    fn from(field: &str) -> Self {
        Self::new(field)
    }
}

/// A facet bound to the variant it aggregates on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetSpec {
    /// Field name, also the aggregation name
    pub name: String,
    pub path: String,
    /// Maximum number of buckets
    pub size: usize,
}

/// How a column is read out of a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    /// Single value at the column path
    Scalar,
    /// Whole sub-document under the column path
    Object,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    /// Dotted path inside the stored document
    pub path: String,
    pub projection: Projection,
}

/// Resolves facet and column names against a schema snapshot
pub struct ProjectionResolver<'a> {
    schema: &'a FieldSchema,
    default_facet_size: usize,
    max_facet_size: usize,
}

impl<'a> ProjectionResolver<'a> {
    pub fn new(schema: &'a FieldSchema, default_facet_size: usize, max_facet_size: usize) -> Self {
        Self {
            schema,
            default_facet_size,
            max_facet_size: max_facet_size.max(1),
        }
    }

    /// Resolve facets in request order; repeats of a field keep the first
    pub fn resolve_facets(&self, requests: &[FacetRequest]) -> (Vec<FacetSpec>, Vec<QueryError>) {
        let mut specs = Vec::with_capacity(requests.len());
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for request in requests {
            let Some(field) = self.schema.lookup(&request.field) else {
                errors.push(QueryError::unknown_field(&request.field));
                continue;
            };
            let Some(variant) = field.exact_variant().filter(|_| field.is_facetable()) else {
                errors.push(QueryError::NotFacetable {
                    field: field.name.clone(),
                });
                continue;
            };
            if !seen.insert(field.name.clone()) {
                continue;
            }

            let size = request
                .size
                .unwrap_or(self.default_facet_size)
                .clamp(1, self.max_facet_size);
            specs.push(FacetSpec {
                name: field.name.clone(),
                path: variant.path.clone(),
                size,
            });
        }

        (specs, errors)
    }

    /// Resolve result columns. An empty request selects the schema's
    /// default columns.
    pub fn resolve_columns(&self, names: &[String]) -> (Vec<ColumnSpec>, Vec<QueryError>) {
        let defaults;
        let names = if names.is_empty() {
            defaults = self.schema.list_default_columns();
            &defaults
        } else {
            names
        };

        let mut specs = Vec::with_capacity(names.len());
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for name in names {
            let Some(field) = self.schema.lookup(name) else {
                errors.push(QueryError::unknown_field(name));
                continue;
            };
            if !seen.insert(field.name.clone()) {
                continue;
            }
            let projection = if field.is_object() {
                Projection::Object
            } else {
                Projection::Scalar
            };
            specs.push(ColumnSpec {
                name: field.name.clone(),
                path: field.name.clone(),
                projection,
            });
        }

        (specs, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ErrorKind;

    fn resolve_facets(requests: &[FacetRequest]) -> (Vec<FacetSpec>, Vec<QueryError>) {
        let schema = FieldSchema::bundled().unwrap();
        ProjectionResolver::new(&schema, 50, 1000).resolve_facets(requests)
    }

    #[test]
    fn test_facet_binds_exact_variant() {
        let (specs, errors) = resolve_facets(&["signature".into(), "product".into()]);
        assert!(errors.is_empty());
        assert_eq!(specs[0].path, "signature.full");
        assert_eq!(specs[1].path, "product");
        assert_eq!(specs[0].size, 50);
    }

    #[test]
    fn test_facet_errors() {
        let (specs, errors) = resolve_facets(&["process_type".into(), "nope".into(), "json_dump".into()]);
        assert!(specs.is_empty());
        let kinds: Vec<ErrorKind> = errors.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![ErrorKind::NotFacetable, ErrorKind::UnknownField, ErrorKind::NotFacetable]
        );
    }

    #[test]
    fn test_facet_size_is_capped_and_duplicates_collapse() {
        let (specs, _) = resolve_facets(&[
            FacetRequest::new("product").with_size(5000),
            FacetRequest::new("product").with_size(3),
        ]);
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].size, 1000);
    }

    #[test]
    fn test_facet_request_accepts_both_forms() {
        let requests: Vec<FacetRequest> =
            serde_json::from_str(r#"["product", {"field": "platform", "size": 10}]"#).unwrap();
        assert_eq!(requests[0], FacetRequest::new("product"));
        assert_eq!(requests[1], FacetRequest::new("platform").with_size(10));
    }

    #[test]
    fn test_columns_default_and_dynamic_object() {
        let schema = FieldSchema::bundled().unwrap();
        let resolver = ProjectionResolver::new(&schema, 50, 1000);

        let (defaults, errors) = resolver.resolve_columns(&[]);
        assert!(errors.is_empty());
        let names: Vec<String> = defaults.iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, schema.list_default_columns());

        let (columns, errors) =
            resolver.resolve_columns(&["json_dump".to_string(), "missing".to_string()]);
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].projection, Projection::Object);
        assert_eq!(errors[0].kind(), ErrorKind::UnknownField);
    }
}
