use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemporalFunction {
    Datetime,
    Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemporalOp {
    Add,
    Sub,
    None,
}

/// `datetime()` / `duration("P...")`, optionally combined with a second
/// temporal expression via `+`/`-` (e.g. `datetime() - duration("PT1H")`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalExpression {
    pub function: TemporalFunction,
    /// The ISO-8601 literal passed to `duration(...)`; empty for `datetime()`.
    pub argument: String,
    pub operation: TemporalOp,
    pub right_expr: Option<Box<TemporalExpression>>,
}

impl TemporalExpression {
    pub fn datetime() -> Self {
        TemporalExpression {
            function: TemporalFunction::Datetime,
            argument: String::new(),
            operation: TemporalOp::None,
            right_expr: None,
        }
    }

    pub fn duration(iso8601: impl Into<String>) -> Self {
        TemporalExpression {
            function: TemporalFunction::Duration,
            argument: iso8601.into(),
            operation: TemporalOp::None,
            right_expr: None,
        }
    }

    pub fn combine(mut self, op: TemporalOp, right: TemporalExpression) -> Self {
        self.operation = op;
        self.right_expr = Some(Box::new(right));
        self
    }
}
