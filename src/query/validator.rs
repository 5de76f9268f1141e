//! Rule validation against a schema snapshot

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use super::error::QueryError;
use super::operator::Operator;
use super::rule::{RawRule, Scalar, TypedValue, ValidatedRule};
use crate::schema::{FieldDefinition, FieldSchema, SemanticType};

/// Checks raw rules against one schema snapshot.
///
/// Each rule is either accepted whole or rejected with a single error; the
/// errors of all rejected rules are returned together.
pub struct RuleValidator<'a> {
    schema: &'a FieldSchema,
}

impl<'a> RuleValidator<'a> {
    pub fn new(schema: &'a FieldSchema) -> Self {
        Self { schema }
    }

    /// Validate every rule. Accepted rules keep their input order.
    pub fn validate(&self, rules: &[RawRule]) -> (Vec<ValidatedRule>, Vec<QueryError>) {
        let mut validated = Vec::with_capacity(rules.len());
        let mut errors = Vec::new();

        for rule in rules {
            match self.validate_rule(rule) {
                Ok(rule) => validated.push(rule),
                Err(e) => {
                    debug!(field = %rule.field, operator = %rule.operator, error = %e, "Rule rejected");
                    errors.push(e);
                }
            }
        }

        (validated, errors)
    }

    pub fn validate_rule(&self, rule: &RawRule) -> Result<ValidatedRule, QueryError> {
        let field = self
            .schema
            .lookup(&rule.field)
            .ok_or_else(|| QueryError::unknown_field(&rule.field))?;

        let operator: Operator = rule.operator.parse().map_err(|_| QueryError::IllegalOperator {
            field: field.name.clone(),
            operator: rule.operator.clone(),
            reason: "unknown operator".to_string(),
        })?;

        if !operator.is_legal_for(field.semantic_type) {
            return Err(QueryError::illegal(
                &field.name,
                operator.as_ref(),
                field.semantic_type,
            ));
        }

        let value = match operator {
            // Presence check; any supplied value is ignored
            Operator::Exists => TypedValue::None,
            Operator::In => TypedValue::List(coerce_list(field, &rule.value)?),
            Operator::Regex => TypedValue::Pattern(check_pattern(field, &rule.value)?),
            Operator::Contains | Operator::StartsWith => {
                let scalar = coerce_single(field, &rule.value)?;
                if matches!(&scalar, Scalar::Text(s) if s.trim().is_empty()) {
                    return Err(QueryError::malformed(
                        &field.name,
                        format!("'{}' needs a non-empty search term", operator),
                    ));
                }
                TypedValue::Single(scalar)
            }
            _ => TypedValue::Single(coerce_single(field, &rule.value)?),
        };

        Ok(ValidatedRule::new(field.clone(), operator, value, rule.negate))
    }
}

fn coerce_single(field: &FieldDefinition, value: &Value) -> Result<Scalar, QueryError> {
    match value {
        Value::Null => field
            .default_null_value
            .as_ref()
            .map(Scalar::from)
            .ok_or_else(|| QueryError::malformed(&field.name, "a value is required")),
        Value::Array(_) | Value::Object(_) => Err(QueryError::malformed(
            &field.name,
            "expected a single value",
        )),
        _ => coerce(field, value),
    }
}

fn coerce_list(field: &FieldDefinition, value: &Value) -> Result<Vec<Scalar>, QueryError> {
    let items = value
        .as_array()
        .ok_or_else(|| QueryError::malformed(&field.name, "'in' expects a list of values"))?;
    if items.is_empty() {
        return Err(QueryError::malformed(&field.name, "'in' needs at least one value"));
    }

    items
        .iter()
        .map(|item| match item {
            Value::Null | Value::Array(_) | Value::Object(_) => Err(QueryError::malformed(
                &field.name,
                "list entries must be scalar values",
            )),
            _ => coerce(field, item),
        })
        .collect()
}

fn check_pattern(field: &FieldDefinition, value: &Value) -> Result<String, QueryError> {
    let pattern = value
        .as_str()
        .ok_or_else(|| QueryError::malformed(&field.name, "regular expression must be a string"))?;
    if pattern.is_empty() {
        return Err(QueryError::malformed(&field.name, "regular expression is empty"));
    }
    regex::Regex::new(pattern).map_err(|e| {
        QueryError::malformed(&field.name, format!("invalid regular expression: {}", e))
    })?;
    if let Some(reason) = unsupported_by_backend(pattern) {
        return Err(QueryError::malformed(&field.name, reason));
    }
    Ok(pattern.to_string())
}

/// Constructs the backend's `regexp` dialect does not understand. Patterns
/// there are always anchored and have no flags, shorthand classes or lazy
/// quantifiers.
fn unsupported_by_backend(pattern: &str) -> Option<String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut in_class = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                match chars.get(i + 1) {
                    Some(next) if next.is_ascii_alphanumeric() => {
                        return Some(format!("escape sequence '\\{}' is not supported", next));
                    }
                    _ => i += 1,
                }
            }
            '[' if !in_class => {
                in_class = true;
                // A leading '^' negates the class and a leading ']' is literal
                if chars.get(i + 1) == Some(&'^') {
                    i += 1;
                }
                if chars.get(i + 1) == Some(&']') {
                    i += 1;
                }
            }
            ']' if in_class => in_class = false,
            _ if in_class => {}
            '^' | '$' => {
                return Some("anchors are not supported; patterns always match the whole value".into());
            }
            '(' if chars.get(i + 1) == Some(&'?') => {
                return Some("inline flags and special groups '(?...)' are not supported".into());
            }
            '*' | '+' | '?' | '}' if chars.get(i + 1) == Some(&'?') => {
                return Some("lazy quantifiers are not supported".into());
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Coerce one scalar JSON value to the field's semantic type
fn coerce(field: &FieldDefinition, value: &Value) -> Result<Scalar, QueryError> {
    let name = field.name.as_str();
    match field.semantic_type {
        SemanticType::String | SemanticType::Keyword => match value {
            Value::String(s) => Ok(Scalar::Text(s.clone())),
            Value::Number(n) => Ok(Scalar::Text(n.to_string())),
            Value::Bool(b) => Ok(Scalar::Text(b.to_string())),
            _ => Err(QueryError::mismatch(name, value, "string")),
        },
        SemanticType::Boolean => coerce_bool(value)
            .map(Scalar::Boolean)
            .ok_or_else(|| QueryError::mismatch(name, value, "boolean")),
        SemanticType::Integer => {
            let n = coerce_integer(value).ok_or_else(|| QueryError::mismatch(name, value, "integer"))?;
            if i32::try_from(n).is_err() {
                return Err(QueryError::mismatch(name, value, "32-bit integer"));
            }
            Ok(Scalar::Integer(n))
        }
        SemanticType::Long => coerce_integer(value)
            .map(Scalar::Integer)
            .ok_or_else(|| QueryError::mismatch(name, value, "long")),
        SemanticType::Double => coerce_double(value)
            .map(Scalar::Double)
            .ok_or_else(|| QueryError::mismatch(name, value, "double")),
        SemanticType::Date => coerce_date(field, value)
            .map(Scalar::Date)
            .ok_or_else(|| {
                let formats: Vec<&str> = field.date_formats.iter().map(|f| f.pattern()).collect();
                QueryError::mismatch(name, value, &format!("date ({})", formats.join("||")))
            }),
        SemanticType::NestedObject => Err(QueryError::mismatch(name, value, "scalar field")),
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn coerce_double(value: &Value) -> Option<f64> {
    let d = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    d.is_finite().then_some(d)
}

/// First declared format that accepts the input wins
fn coerce_date(field: &FieldDefinition, value: &Value) -> Option<DateTime<Utc>> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    field.date_formats.iter().find_map(|format| format.parse(&text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::error::ErrorKind;
    use chrono::TimeZone;
    use serde_json::json;

    fn schema() -> FieldSchema {
        FieldSchema::bundled().unwrap()
    }

    fn validate_one(rule: RawRule) -> Result<ValidatedRule, QueryError> {
        let schema = schema();
        RuleValidator::new(&schema).validate_rule(&rule)
    }

    #[test]
    fn test_accepts_legal_rule() {
        let rule = validate_one(RawRule::new("signature", "contains", json!("OOM"))).unwrap();
        assert_eq!(rule.operator(), Operator::Contains);
        assert_eq!(rule.value(), &TypedValue::Single(Scalar::Text("OOM".into())));
        assert_eq!(rule.field_name(), "signature");
    }

    #[test]
    fn test_unknown_field() {
        let err = validate_one(RawRule::new("not_a_field", "equals", json!("x"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownField);
        assert_eq!(err.field(), "not_a_field");
    }

    #[test]
    fn test_illegal_operator_for_type() {
        let err = validate_one(RawRule::new("uptime", "contains", json!("5"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalOperator);

        let err = validate_one(RawRule::new("json_dump", "equals", json!("x"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalOperator);

        let err = validate_one(RawRule::new("product", "between", json!("x"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalOperator);
    }

    #[test]
    fn test_type_mismatch() {
        let err = validate_one(RawRule::new("uptime", "greaterThan", json!("abc"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);

        let err = validate_one(RawRule::new("addons_checked", "equals", json!("maybe"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);

        let err =
            validate_one(RawRule::new("date_processed", "greaterThan", json!("yesterday"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_integer_range_is_enforced() {
        let schema = schema();
        let integer_field = schema
            .fields()
            .find(|f| f.semantic_type == SemanticType::Integer)
            .unwrap()
            .name
            .clone();
        let err = validate_one(RawRule::new(&integer_field, "equals", json!(5_000_000_000i64))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_malformed_values() {
        let err = validate_one(RawRule::new("product", "in", json!([]))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedValue);

        let err = validate_one(RawRule::new("product", "in", json!("Firefox"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedValue);

        let err = validate_one(RawRule::new("product", "regex", json!("(unclosed"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedValue);

        let err = validate_one(RawRule::new("product", "equals", Value::Null)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedValue);
    }

    #[test]
    fn test_regex_limited_to_backend_dialect() {
        for pattern in ["(?i)oom\\d+", "^js::.*", "OOM.*$", "oom\\w", "a+?b"] {
            let err = validate_one(RawRule::new("signature", "regex", json!(pattern))).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedValue, "{}", pattern);
        }

        for pattern in ["js::.*", "OOM \\| (small|large)", "[^a-z]{2,4}", "[$^]x", "nsAString_internal::.+"] {
            let rule = validate_one(RawRule::new("signature", "regex", json!(pattern)));
            assert!(rule.is_ok(), "{}", pattern);
        }
    }

    #[test]
    fn test_null_value_default_fills_missing_value() {
        let rule = validate_one(RawRule::new("addons_checked", "equals", Value::Null)).unwrap();
        assert_eq!(rule.value(), &TypedValue::Single(Scalar::Boolean(false)));
    }

    #[test]
    fn test_exists_ignores_value() {
        let rule = validate_one(RawRule::new("json_dump", "exists", json!("ignored"))).unwrap();
        assert_eq!(rule.value(), &TypedValue::None);
    }

    #[test]
    fn test_date_uses_declared_formats() {
        let rule = validate_one(RawRule::new(
            "date_processed",
            ">=",
            json!("2024-03-01T00:00:00+00:00"),
        ))
        .unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(rule.value(), &TypedValue::Single(Scalar::Date(expected)));

        let rule = validate_one(RawRule::new("install_time", "<", json!(1709251200))).unwrap();
        assert_eq!(rule.value(), &TypedValue::Single(Scalar::Date(expected)));
    }

    #[test]
    fn test_in_coerces_every_entry() {
        let rule = validate_one(RawRule::new("uptime", "in", json!([1, "2"]))).unwrap();
        assert_eq!(
            rule.value(),
            &TypedValue::List(vec![Scalar::Integer(1), Scalar::Integer(2)])
        );

        let err = validate_one(RawRule::new("uptime", "in", json!([1, "two"]))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_collects_all_errors() {
        let schema = schema();
        let rules = vec![
            RawRule::new("nope", "equals", json!("x")),
            RawRule::new("product", "equals", json!("Firefox")),
            RawRule::new("uptime", "greaterThan", json!("abc")),
        ];
        let (valid, errors) = RuleValidator::new(&schema).validate(&rules);
        assert_eq!(valid.len(), 1);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field(), "nope");
        assert_eq!(errors[1].field(), "uptime");
    }
}
