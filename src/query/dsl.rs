//! Rendering of compiled queries as Elasticsearch query DSL

use serde_json::{json, Map, Value};

use super::compiler::{CompiledQuery, Condition, Predicate, QueryNode, RangeBounds};
use crate::projection::{ColumnSpec, FacetSpec};

/// Translates compiled queries and projections into request-body JSON
pub struct ElasticsearchDsl;

impl ElasticsearchDsl {
    pub fn translate(query: &CompiledQuery) -> Value {
        Self::translate_node(query.root())
    }

    pub fn translate_node(node: &QueryNode) -> Value {
        match node {
            QueryNode::MatchAll => json!({ "match_all": {} }),
            QueryNode::And(nodes) => {
                let clauses: Vec<Value> = nodes.iter().map(Self::translate_node).collect();
                json!({ "bool": { "must": clauses } })
            }
            QueryNode::Or(nodes) => {
                let clauses: Vec<Value> = nodes.iter().map(Self::translate_node).collect();
                json!({ "bool": { "should": clauses, "minimum_should_match": 1 } })
            }
            QueryNode::Not(inner) => {
                json!({ "bool": { "must_not": [Self::translate_node(inner)] } })
            }
            QueryNode::Predicate(predicate) => Self::translate_predicate(predicate),
        }
    }

    fn translate_predicate(predicate: &Predicate) -> Value {
        let path = predicate.path.as_str();
        match &predicate.condition {
            Condition::Term { value } => json!({ "term": { path: value.to_json() } }),
            Condition::Terms { values } => {
                let values: Vec<Value> = values.iter().map(|v| v.to_json()).collect();
                json!({ "terms": { path: values } })
            }
            Condition::Match { text } => {
                json!({ "match": { path: { "query": text, "operator": "and" } } })
            }
            Condition::Phrase { text } => json!({ "match_phrase": { path: text } }),
            Condition::Prefix { prefix } => json!({ "prefix": { path: prefix } }),
            Condition::Regexp { pattern } => json!({ "regexp": { path: pattern } }),
            Condition::Range(bounds) => json!({ "range": { path: Self::range_bounds(bounds) } }),
            Condition::Exists => json!({ "exists": { "field": path } }),
        }
    }

    fn range_bounds(bounds: &RangeBounds) -> Value {
        let mut out = Map::new();
        for (key, bound) in [
            ("gt", &bounds.gt),
            ("gte", &bounds.gte),
            ("lt", &bounds.lt),
            ("lte", &bounds.lte),
        ] {
            if let Some(bound) = bound {
                out.insert(key.to_string(), bound.to_json());
            }
        }
        Value::Object(out)
    }

    /// One terms aggregation per facet, keyed by field name
    pub fn aggregations(facets: &[FacetSpec]) -> Value {
        let aggs: Map<String, Value> = facets
            .iter()
            .map(|facet| {
                (
                    facet.name.clone(),
                    json!({ "terms": { "field": facet.path, "size": facet.size } }),
                )
            })
            .collect();
        Value::Object(aggs)
    }

    /// `_source` include list for the requested columns
    pub fn source_includes(columns: &[ColumnSpec]) -> Value {
        let includes: Vec<Value> = columns
            .iter()
            .map(|c| Value::from(c.path.as_str()))
            .collect();
        Value::Array(includes)
    }
}
