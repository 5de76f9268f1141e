//! Compilation of validated rules into a backend-neutral query tree

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::QueryError;
use super::operator::Operator;
use super::rule::{Scalar, TypedValue, ValidatedRule};
use crate::schema::{DateFormat, EpochUnit, FieldDefinition, IndexingVariant, VariantKind};

/// Bounds of a range predicate
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RangeBounds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gt: Option<Scalar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gte: Option<Scalar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lt: Option<Scalar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lte: Option<Scalar>,
}

/// What a predicate tests, with values already in the variant's stored form
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Condition {
    /// Verbatim equality
    Term { value: Scalar },
    /// Verbatim equality with any listed value
    Terms { values: Vec<Scalar> },
    /// Tokenized full-text match
    Match { text: String },
    /// Equality against an analyzed-only variant
    Phrase { text: String },
    Prefix { prefix: String },
    Regexp { pattern: String },
    Range(RangeBounds),
    Exists,
}

/// A test bound to exactly one indexing variant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Predicate {
    /// Logical field name
    pub field: String,
    /// Backend path of the chosen variant
    pub path: String,
    pub condition: Condition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryNode {
    MatchAll,
    And(Vec<QueryNode>),
    Or(Vec<QueryNode>),
    Not(Box<QueryNode>),
    Predicate(Predicate),
}

impl QueryNode {
    fn predicate(field: &FieldDefinition, variant: &IndexingVariant, condition: Condition) -> Self {
        QueryNode::Predicate(Predicate {
            field: field.name.clone(),
            path: variant.path.clone(),
            condition,
        })
    }

    /// Leaf predicates in depth-first order
    pub fn predicates(&self) -> Vec<&Predicate> {
        let mut out = Vec::new();
        self.collect_predicates(&mut out);
        out
    }

    fn collect_predicates<'a>(&'a self, out: &mut Vec<&'a Predicate>) {
        match self {
            QueryNode::MatchAll => {}
            QueryNode::And(nodes) | QueryNode::Or(nodes) => {
                nodes.iter().for_each(|n| n.collect_predicates(out))
            }
            QueryNode::Not(inner) => inner.collect_predicates(out),
            QueryNode::Predicate(p) => out.push(p),
        }
    }
}

/// Compiled form of a rule set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    root: QueryNode,
}

impl CompiledQuery {
    pub fn match_all() -> Self {
        Self {
            root: QueryNode::MatchAll,
        }
    }

    pub fn root(&self) -> &QueryNode {
        &self.root
    }

    pub fn is_match_all(&self) -> bool {
        self.root == QueryNode::MatchAll
    }
}

/// Turns validated rules into a [`CompiledQuery`].
///
/// Rules are combined with AND in input order, so the same rules always
/// produce the same tree.
pub struct QueryCompiler;

impl QueryCompiler {
    pub fn compile(rules: &[ValidatedRule]) -> Result<CompiledQuery, Vec<QueryError>> {
        let mut nodes = Vec::with_capacity(rules.len());
        let mut errors = Vec::new();

        for rule in rules {
            match Self::compile_rule(rule) {
                Ok(node) => nodes.push(node),
                Err(e) => errors.push(e),
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let root = match nodes.len() {
            0 => QueryNode::MatchAll,
            1 => nodes.remove(0),
            _ => QueryNode::And(nodes),
        };
        Ok(CompiledQuery { root })
    }

    pub fn compile_rule(rule: &ValidatedRule) -> Result<QueryNode, QueryError> {
        let field = rule.field();
        let operator = rule.operator();
        let unsupported = || QueryError::UnsupportedOperator {
            field: field.name.clone(),
            operator,
        };

        let node = match (operator, rule.value()) {
            (Operator::Exists, _) => {
                let variant = exact_first(field);
                QueryNode::predicate(field, variant, Condition::Exists)
            }
            (Operator::Equals, TypedValue::Single(value)) => Self::equality(field, value)?,
            (Operator::In, TypedValue::List(values)) => {
                let variant = exact_first(field);
                if variant.kind == VariantKind::Analyzed {
                    let phrases = values
                        .iter()
                        .map(|v| QueryNode::predicate(field, variant, Condition::Phrase { text: text_of(v) }))
                        .collect();
                    QueryNode::Or(phrases)
                } else {
                    QueryNode::predicate(
                        field,
                        variant,
                        Condition::Terms {
                            values: values.clone(),
                        },
                    )
                }
            }
            (Operator::Contains, TypedValue::Single(value)) => {
                let variant = field.analyzed_variant().ok_or_else(unsupported)?;
                QueryNode::predicate(field, variant, Condition::Match { text: text_of(value) })
            }
            (Operator::StartsWith, TypedValue::Single(value)) => {
                let variant = verbatim_text_variant(field).ok_or_else(unsupported)?;
                QueryNode::predicate(field, variant, Condition::Prefix { prefix: text_of(value) })
            }
            (Operator::Regex, TypedValue::Pattern(pattern)) => {
                let variant = verbatim_text_variant(field).ok_or_else(unsupported)?;
                QueryNode::predicate(
                    field,
                    variant,
                    Condition::Regexp {
                        pattern: pattern.clone(),
                    },
                )
            }
            (op, TypedValue::Single(value)) if op.is_range() => {
                let (variant, bound) = Self::range_operand(field, value).ok_or_else(unsupported)?;
                let mut bounds = RangeBounds::default();
                match op {
                    Operator::GreaterThan => bounds.gt = Some(bound),
                    Operator::GreaterThanOrEqual => bounds.gte = Some(bound),
                    Operator::LessThan => bounds.lt = Some(bound),
                    _ => bounds.lte = Some(bound),
                }
                QueryNode::predicate(field, variant, Condition::Range(bounds))
            }
            _ => return Err(unsupported()),
        };

        Ok(if rule.is_negated() {
            QueryNode::Not(Box::new(node))
        } else {
            node
        })
    }

    /// Inclusive date window on a date field, used for default bounds.
    /// Returns `None` when neither bound is set.
    pub fn date_window(
        field: &FieldDefinition,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Option<QueryNode> {
        if from.is_none() && to.is_none() {
            return None;
        }
        let probe = Scalar::Date(from.or(to)?);
        let (variant, _) = Self::range_operand(field, &probe)?;

        let bounds = RangeBounds {
            gte: from.and_then(|dt| Self::range_operand(field, &Scalar::Date(dt)).map(|(_, b)| b)),
            lte: to.and_then(|dt| Self::range_operand(field, &Scalar::Date(dt)).map(|(_, b)| b)),
            ..RangeBounds::default()
        };
        Some(QueryNode::predicate(field, variant, Condition::Range(bounds)))
    }

    fn equality(field: &FieldDefinition, value: &Scalar) -> Result<QueryNode, QueryError> {
        if let Scalar::Date(dt) = value {
            // Date equality compares the string form in the first declared format that keeps the instant
            let variant = field
                .date_variant()
                .or_else(|| field.epoch_variant())
                .ok_or_else(|| QueryError::UnsupportedOperator {
                    field: field.name.clone(),
                    operator: Operator::Equals,
                })?;
            let stored = stored_date(field, variant, dt);
            return Ok(QueryNode::predicate(field, variant, Condition::Term { value: stored }));
        }

        let variant = exact_first(field);
        let condition = if variant.kind == VariantKind::Analyzed {
            Condition::Phrase {
                text: text_of(value),
            }
        } else {
            Condition::Term {
                value: value.clone(),
            }
        };
        Ok(QueryNode::predicate(field, variant, condition))
    }

    /// Variant and stored bound for a range comparison. Date ranges prefer
    /// the epoch variant and compare numerically.
    fn range_operand<'f>(
        field: &'f FieldDefinition,
        value: &Scalar,
    ) -> Option<(&'f IndexingVariant, Scalar)> {
        match value {
            Scalar::Date(dt) => {
                let variant = field.epoch_variant().or_else(|| field.date_variant())?;
                Some((variant, stored_date(field, variant, dt)))
            }
            _ => {
                let variant = field
                    .indexing_variants
                    .iter()
                    .find(|v| v.kind == VariantKind::Numeric)?;
                Some((variant, value.clone()))
            }
        }
    }
}

/// Exact variant if the field has one, otherwise its root
fn exact_first(field: &FieldDefinition) -> &IndexingVariant {
    field
        .exact_variant()
        .unwrap_or_else(|| field.root_variant())
}

/// Prefix and regex matching need an untokenized string variant
fn verbatim_text_variant(field: &FieldDefinition) -> Option<&IndexingVariant> {
    field
        .indexing_variants
        .iter()
        .find(|v| v.kind == VariantKind::Exact)
}

fn stored_date(field: &FieldDefinition, variant: &IndexingVariant, dt: &DateTime<Utc>) -> Scalar {
    match variant.kind {
        VariantKind::Epoch(EpochUnit::Seconds) => Scalar::Integer(dt.timestamp()),
        VariantKind::Epoch(EpochUnit::Millis) => Scalar::Integer(dt.timestamp_millis()),
        _ => field
            .date_formats
            .iter()
            .find_map(|format| lossless_rendering(format, dt))
            .or_else(|| field.date_formats.first().map(|format| format.format(dt)))
            .and_then(|rendered| Scalar::from_json(&rendered))
            .unwrap_or(Scalar::Date(*dt)),
    }
}

/// Rendering of `dt` in `format`, if parsing it back yields the same instant
fn lossless_rendering(format: &DateFormat, dt: &DateTime<Utc>) -> Option<serde_json::Value> {
    let rendered = format.format(dt);
    let text = match &rendered {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    (format.parse(&text).as_ref() == Some(dt)).then_some(rendered)
}

fn text_of(value: &Scalar) -> String {
    match value {
        Scalar::Text(s) => s.clone(),
        other => match other.to_json() {
            serde_json::Value::String(s) => s,
            v => v.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::rule::RawRule;
    use crate::query::validator::RuleValidator;
    use crate::schema::FieldSchema;
    use chrono::TimeZone;
    use serde_json::json;

    fn compile(rules: Vec<RawRule>) -> Result<CompiledQuery, Vec<QueryError>> {
        let schema = FieldSchema::bundled().unwrap();
        let (valid, errors) = RuleValidator::new(&schema).validate(&rules);
        assert!(errors.is_empty(), "unexpected validation errors: {:?}", errors);
        QueryCompiler::compile(&valid)
    }

    fn single(rule: RawRule) -> Predicate {
        match compile(vec![rule]).unwrap().root().clone() {
            QueryNode::Predicate(p) => p,
            other => panic!("expected a single predicate, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_rules_match_all() {
        assert!(compile(vec![]).unwrap().is_match_all());
    }

    #[test]
    fn test_contains_uses_analyzed_variant() {
        let p = single(RawRule::new("signature", "contains", json!("OOM")));
        assert_eq!(p.path, "signature");
        assert_eq!(p.condition, Condition::Match { text: "OOM".into() });
    }

    #[test]
    fn test_equals_prefers_exact_variant() {
        let p = single(RawRule::new("signature", "equals", json!("OOM | small")));
        assert_eq!(p.path, "signature.full");
        assert_eq!(
            p.condition,
            Condition::Term {
                value: Scalar::Text("OOM | small".into())
            }
        );
    }

    #[test]
    fn test_equals_on_analyzed_only_field_is_phrase() {
        let p = single(RawRule::new("process_type", "equals", json!("content")));
        assert_eq!(p.path, "process_type");
        assert!(matches!(p.condition, Condition::Phrase { .. }));
    }

    #[test]
    fn test_contains_on_exact_only_field_is_unsupported() {
        let errors = compile(vec![RawRule::new("product", "contains", json!("Fire"))]).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0],
            QueryError::UnsupportedOperator {
                field: "product".into(),
                operator: Operator::Contains
            }
        );
    }

    #[test]
    fn test_starts_with_needs_exact_variant() {
        let p = single(RawRule::new("signature", "startsWith", json!("js::")));
        assert_eq!(p.path, "signature.full");

        let errors = compile(vec![RawRule::new("process_type", "^", json!("co"))]).unwrap_err();
        assert!(matches!(errors[0], QueryError::UnsupportedOperator { .. }));
    }

    #[test]
    fn test_date_range_prefers_epoch_variant() {
        let p = single(RawRule::new(
            "date_processed",
            "greaterThanOrEqual",
            json!("2024-03-01T00:00:00+00:00"),
        ));
        assert_eq!(p.path, "date_processed.epoch");
        assert_eq!(
            p.condition,
            Condition::Range(RangeBounds {
                gte: Some(Scalar::Integer(1_709_251_200)),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_date_equality_uses_string_variant() {
        let p = single(RawRule::new(
            "date_processed",
            "equals",
            json!("2024-03-01T00:00:00Z"),
        ));
        assert_eq!(p.path, "date_processed");
        assert_eq!(
            p.condition,
            Condition::Term {
                value: Scalar::Text("2024-03-01T00:00:00+00:00".into())
            }
        );
    }

    #[test]
    fn test_date_equality_keeps_fractional_seconds() {
        let p = single(RawRule::new(
            "date_processed",
            "equals",
            json!("2024-03-01T12:30:00.123456+00:00"),
        ));
        assert_eq!(p.path, "date_processed");
        assert_eq!(
            p.condition,
            Condition::Term {
                value: Scalar::Text("2024-03-01T12:30:00.123456+00:00".into())
            }
        );
    }

    #[test]
    fn test_negate_wraps_in_not() {
        let query = compile(vec![RawRule::new("product", "equals", json!("Firefox")).negated()]).unwrap();
        match query.root() {
            QueryNode::Not(inner) => assert!(matches!(**inner, QueryNode::Predicate(_))),
            other => panic!("expected NOT, got {:?}", other),
        }
    }

    #[test]
    fn test_rules_are_anded_in_order_and_deterministic() {
        let rules = vec![
            RawRule::new("product", "equals", json!("Firefox")),
            RawRule::new("uptime", "lessThan", json!(60)),
            RawRule::exists("json_dump"),
        ];
        let first = compile(rules.clone()).unwrap();
        let second = compile(rules).unwrap();
        assert_eq!(first, second);

        let paths: Vec<&str> = first.root().predicates().iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec!["product", "uptime", "json_dump"]);
        assert!(matches!(first.root(), QueryNode::And(nodes) if nodes.len() == 3));
    }

    #[test]
    fn test_date_window() {
        let schema = FieldSchema::bundled().unwrap();
        let field = schema.lookup("date_processed").unwrap();
        let from = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();

        let node = QueryCompiler::date_window(field, Some(from), None).unwrap();
        let p = node.predicates()[0].clone();
        assert_eq!(p.path, "date_processed.epoch");
        assert_eq!(
            p.condition,
            Condition::Range(RangeBounds {
                gte: Some(Scalar::Integer(1_709_251_200)),
                ..Default::default()
            })
        );
        assert!(QueryCompiler::date_window(field, None, None).is_none());
    }
}
