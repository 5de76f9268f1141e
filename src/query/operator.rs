//! Rule operators and the operator/type legality matrix

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, IntoEnumIterator};

use crate::schema::SemanticType;

/// Comparison operator of a rule
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Operator {
    /// Exact match
    Equals,
    /// Full-text match on an analyzed variant
    Contains,
    /// Prefix match on an exact variant
    StartsWith,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    /// Any of a list of values
    In,
    /// Field has a value
    Exists,
    /// Regular expression on an exact variant
    Regex,
}

impl Operator {
    /// Whether this operator may be used on a field of the given type
    pub fn is_legal_for(&self, semantic_type: SemanticType) -> bool {
        use Operator::*;
        match semantic_type {
            SemanticType::String | SemanticType::Keyword => {
                matches!(self, Equals | In | Contains | StartsWith | Regex | Exists)
            }
            SemanticType::Boolean => matches!(self, Equals | Exists),
            SemanticType::Integer | SemanticType::Long | SemanticType::Double => matches!(
                self,
                Equals | In | GreaterThan | GreaterThanOrEqual | LessThan | LessThanOrEqual | Exists
            ),
            SemanticType::Date => matches!(
                self,
                Equals | GreaterThan | GreaterThanOrEqual | LessThan | LessThanOrEqual | Exists
            ),
            SemanticType::NestedObject => matches!(self, Exists),
        }
    }

    /// Operators legal for a type, in declaration order
    pub fn legal_for(semantic_type: SemanticType) -> Vec<Operator> {
        Operator::iter()
            .filter(|op| op.is_legal_for(semantic_type))
            .collect()
    }

    pub fn is_range(&self) -> bool {
        matches!(
            self,
            Operator::GreaterThan
                | Operator::GreaterThanOrEqual
                | Operator::LessThan
                | Operator::LessThanOrEqual
        )
    }

    /// Operators that bind to a verbatim-value variant
    pub fn is_exact_match(&self) -> bool {
        matches!(self, Operator::Equals | Operator::In | Operator::Exists)
    }

    /// Whether a matching rule constrains the lower end of a range
    pub fn sets_lower_bound(&self) -> bool {
        matches!(
            self,
            Operator::GreaterThan | Operator::GreaterThanOrEqual | Operator::Equals
        )
    }

    /// Whether a matching rule constrains the upper end of a range
    pub fn sets_upper_bound(&self) -> bool {
        matches!(
            self,
            Operator::LessThan | Operator::LessThanOrEqual | Operator::Equals
        )
    }
}

/// Error returned for an operator name that is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operator '{0}'")]
pub struct UnknownOperator(pub String);

impl FromStr for Operator {
    type Err = UnknownOperator;

    /// Accepts the camelCase names plus the short symbols used by crash
    /// search forms (`~` contains, `^` starts with, `@` regex).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.trim() {
            "equals" | "=" | "has" => Operator::Equals,
            "contains" | "~" => Operator::Contains,
            "startsWith" | "^" => Operator::StartsWith,
            "greaterThan" | ">" => Operator::GreaterThan,
            "greaterThanOrEqual" | ">=" => Operator::GreaterThanOrEqual,
            "lessThan" | "<" => Operator::LessThan,
            "lessThanOrEqual" | "<=" => Operator::LessThanOrEqual,
            "in" => Operator::In,
            "exists" => Operator::Exists,
            "regex" | "@" => Operator::Regex,
            other => return Err(UnknownOperator(other.to_string())),
        };
        Ok(op)
    }
}
