//! Filter rules, before and after validation

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::sync::Arc;

use super::operator::Operator;
use crate::schema::{FieldDefinition, NullValue};

/// A filter rule as submitted by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRule {
    pub field: String,

    /// Operator name or symbol, checked during validation
    pub operator: String,

    /// Scalar, list or absent depending on the operator
    #[serde(default)]
    pub value: Value,

    #[serde(default)]
    pub negate: bool,
}

impl RawRule {
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value,
            negate: false,
        }
    }

    /// `exists` rule, which takes no value
    pub fn exists(field: impl Into<String>) -> Self {
        Self::new(field, Operator::Exists.to_string(), Value::Null)
    }

    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }
}

/// A single typed value
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
}

impl Scalar {
    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Text(s) => Value::from(s.as_str()),
            Scalar::Integer(i) => Value::from(*i),
            Scalar::Double(d) => Value::from(*d),
            Scalar::Boolean(b) => Value::from(*b),
            Scalar::Date(dt) => Value::from(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Scalar::Date(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Converts a backend-ready JSON value back into a scalar
    pub(crate) fn from_json(value: &Value) -> Option<Scalar> {
        match value {
            Value::String(s) => Some(Scalar::Text(s.clone())),
            Value::Bool(b) => Some(Scalar::Boolean(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Scalar::Integer)
                .or_else(|| n.as_f64().map(Scalar::Double)),
            _ => None,
        }
    }
}

impl From<&NullValue> for Scalar {
    fn from(value: &NullValue) -> Self {
        match value {
            NullValue::Boolean(b) => Scalar::Boolean(*b),
            NullValue::Integer(i) => Scalar::Integer(*i),
            NullValue::Double(d) => Scalar::Double(*d),
            NullValue::Text(s) => Scalar::Text(s.clone()),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Value of a validated rule, shaped by its operator
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
    /// `exists` carries no value
    None,
    Single(Scalar),
    /// Non-empty list for `in`
    List(Vec<Scalar>),
    /// Regular expression source, known to compile
    Pattern(String),
}

impl TypedValue {
    pub fn as_single(&self) -> Option<&Scalar> {
        match self {
            TypedValue::Single(s) => Some(s),
            _ => None,
        }
    }
}

/// A rule bound to a schema field, with its value coerced to the field type.
///
/// Only the validator builds these, so holding one means the field exists,
/// the operator is legal for it and the value has the right shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRule {
    field: Arc<FieldDefinition>,
    operator: Operator,
    value: TypedValue,
    negate: bool,
}

impl ValidatedRule {
    pub(crate) fn new(
        field: Arc<FieldDefinition>,
        operator: Operator,
        value: TypedValue,
        negate: bool,
    ) -> Self {
        Self {
            field,
            operator,
            value,
            negate,
        }
    }

    pub fn field(&self) -> &FieldDefinition {
        &self.field
    }

    pub fn field_name(&self) -> &str {
        &self.field.name
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> &TypedValue {
        &self.value
    }

    pub fn is_negated(&self) -> bool {
        self.negate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_raw_rule_defaults() {
        let rule: RawRule =
            serde_json::from_value(json!({"field": "product", "operator": "exists"})).unwrap();
        assert_eq!(rule.value, Value::Null);
        assert!(!rule.negate);
        assert_eq!(rule, RawRule::exists("product"));
    }

    #[test]
    fn test_scalar_json() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(Scalar::Date(dt).to_json(), json!("2024-03-01T12:00:00Z"));
        assert_eq!(Scalar::Integer(7).to_json(), json!(7));
        assert_eq!(Scalar::from_json(&json!(1.5)), Some(Scalar::Double(1.5)));
        assert_eq!(Scalar::from_json(&json!(null)), None);
    }

    #[test]
    fn test_typed_value_serializes_untagged() {
        let value = TypedValue::List(vec![Scalar::Text("a".into()), Scalar::Text("b".into())]);
        assert_eq!(serde_json::to_value(&value).unwrap(), json!(["a", "b"]));
        assert_eq!(serde_json::to_value(&TypedValue::None).unwrap(), json!(null));
    }
}
