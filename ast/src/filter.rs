use serde::{Deserialize, Serialize};

use crate::temporal::TemporalExpression;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Equals,
    NotEquals,
    Gt,
    Lt,
    Gte,
    Lte,
    Regex,
    Contains,
}

/// The right-hand side of a filter predicate: a literal value, or a temporal
/// expression (`datetime()`, `duration(...)`, and their sum/difference) that
/// must be evaluated against "now" before comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WhereValue {
    Literal(serde_json::Value),
    Temporal(TemporalExpression),
}

/// One predicate over a bound resource's field, e.g. `x.metadata.labels.env = "prod"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValuePair {
    /// Variable-relative JSONPath, e.g. `metadata.labels.env` or `foo[*].bar`.
    pub key: String,
    pub value: WhereValue,
    pub operator: Operator,
    pub is_negated: bool,
}

impl KeyValuePair {
    pub fn literal(
        key: impl Into<String>,
        operator: Operator,
        value: serde_json::Value,
    ) -> Self {
        KeyValuePair {
            key: key.into(),
            value: WhereValue::Literal(value),
            operator,
            is_negated: false,
        }
    }
}
