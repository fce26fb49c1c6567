//! Temporal Evaluator: `datetime()` / `duration(ISO8601)` expressions used by
//! WHERE filters (`spec` §4.7).

use chrono::{DateTime, Duration, Timelike, Utc};
use qgraph_ast::{Operator, TemporalExpression, TemporalFunction, TemporalOp};

use crate::errors::EngineErrorKind;
use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TemporalValue {
    Instant(DateTime<Utc>),
    Span(Duration),
}

/// `datetime()`, truncated to seconds.
pub fn datetime_now(now: DateTime<Utc>) -> DateTime<Utc> {
    now.with_nanosecond(0).unwrap_or(now)
}

/// Parses an ISO-8601 duration designator string (the `P...` form). `Y` = 365
/// days; `M` before `T` is a 30-day month, `M` after `T` is minutes.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let rest = input
        .strip_prefix('P')
        .ok_or_else(|| invalid(input))?;

    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (rest, None),
    };

    let mut total = Duration::zero();
    total = total + parse_designators(date_part, false, input)?;
    if let Some(t) = time_part {
        total = total + parse_designators(t, true, input)?;
    }
    Ok(total)
}

fn parse_designators(segment: &str, in_time: bool, original: &str) -> Result<Duration> {
    let mut total = Duration::zero();
    let mut number = String::new();

    for ch in segment.chars() {
        if ch.is_ascii_digit() {
            number.push(ch);
            continue;
        }
        if number.is_empty() {
            return Err(invalid(original));
        }
        let value: i64 = number.parse().map_err(|_| invalid(original))?;
        number.clear();

        let component = match (ch, in_time) {
            ('Y', false) => Duration::days(value * 365),
            ('D', false) => Duration::days(value),
            ('M', false) => Duration::days(value * 30),
            ('H', true) => Duration::hours(value),
            ('M', true) => Duration::minutes(value),
            ('S', true) => Duration::seconds(value),
            ('H', false) | ('S', false) => return Err(invalid(original)),
            _ => return Err(invalid(original)),
        };
        total = total + component;
    }

    if !number.is_empty() {
        return Err(invalid(original));
    }
    Ok(total)
}

fn invalid(input: &str) -> EngineError {
    EngineErrorKind::DurationInvalid(input.to_string()).into()
}

/// Evaluates a (possibly combined) temporal expression against `now`.
pub fn evaluate(expr: &TemporalExpression, now: DateTime<Utc>) -> Result<TemporalValue> {
    let base = match expr.function {
        TemporalFunction::Datetime => TemporalValue::Instant(datetime_now(now)),
        TemporalFunction::Duration => TemporalValue::Span(parse_duration(&expr.argument)?),
    };

    match (&expr.right_expr, expr.operation) {
        (Some(right), op) if op != TemporalOp::None => {
            let right_val = evaluate(right, now)?;
            combine(base, op, right_val)
        }
        _ => Ok(base),
    }
}

/// `Span - Instant` is kept distinct from `Instant - Span` (§8 "Temporal
/// commutativity"): both shift the instant by the same magnitude but in
/// opposite directions, so the two expressions never collapse to one value.
fn combine(left: TemporalValue, op: TemporalOp, right: TemporalValue) -> Result<TemporalValue> {
    use TemporalValue::*;
    match (left, right, op) {
        (Instant(i), Span(s), TemporalOp::Add) => Ok(Instant(i + s)),
        (Instant(i), Span(s), TemporalOp::Sub) => Ok(Instant(i - s)),
        (Span(s), Instant(i), TemporalOp::Add) => Ok(Instant(i + s)),
        (Span(s), Instant(i), TemporalOp::Sub) => Ok(Instant(i + s)),
        (Span(a), Span(b), TemporalOp::Add) => Ok(Span(a + b)),
        (Span(a), Span(b), TemporalOp::Sub) => Ok(Span(a - b)),
        (Instant(_), Instant(_), _) => Err(EngineErrorKind::OperatorUnsupported.into()),
        (_, _, TemporalOp::None) => unreachable!("caller filters out TemporalOp::None"),
    }
}

/// Compares a resource field's RFC 3339 timestamp against a temporal
/// expression, truncating both sides to seconds first. An unparsable field
/// value is treated as "no match" rather than an error, consistent with the
/// engine's other criterion-lookup failures.
pub fn compare(
    field_value: &serde_json::Value,
    temporal: &TemporalExpression,
    operator: Operator,
    now: DateTime<Utc>,
) -> Result<bool> {
    let TemporalValue::Instant(rhs) = evaluate(temporal, now)? else {
        return Err(EngineErrorKind::ComparisonUnsupported(
            "temporal comparison requires a datetime-valued expression".to_string(),
        )
        .into());
    };

    let Some(text) = field_value.as_str() else {
        return Ok(false);
    };
    let Ok(lhs) = DateTime::parse_from_rfc3339(text) else {
        return Ok(false);
    };
    let lhs = lhs.with_timezone(&Utc).with_nanosecond(0).unwrap_or(lhs.with_timezone(&Utc));
    let rhs = rhs.with_nanosecond(0).unwrap_or(rhs);

    let result = match operator {
        Operator::Equals => lhs == rhs,
        Operator::NotEquals => lhs != rhs,
        Operator::Gt => lhs > rhs,
        Operator::Lt => lhs < rhs,
        Operator::Gte => lhs >= rhs,
        Operator::Lte => lhs <= rhs,
        Operator::Regex | Operator::Contains => {
            return Err(EngineErrorKind::OperatorUnsupported.into())
        }
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 28, 12, 0, 0).unwrap()
    }

    #[test]
    fn parses_hours_and_minutes() {
        assert_eq!(parse_duration("PT1H30M").unwrap(), Duration::minutes(90));
    }

    #[test]
    fn one_year_is_365_days() {
        assert_eq!(parse_duration("P1Y").unwrap(), Duration::hours(8760));
    }

    #[test]
    fn year_designator_in_time_section_fails() {
        assert!(parse_duration("PT1Y").is_err());
    }

    #[test]
    fn designator_without_number_fails() {
        assert!(parse_duration("PTH").is_err());
    }

    #[test]
    fn trailing_number_without_designator_fails() {
        assert!(parse_duration("PT1H30").is_err());
    }

    #[test]
    fn sub_order_is_distinguished() {
        let dt = TemporalExpression::datetime();
        let dur = TemporalExpression::duration("PT1H");

        let a = evaluate(&dt.clone().combine(TemporalOp::Sub, dur.clone()), now()).unwrap();
        let b = evaluate(&dur.combine(TemporalOp::Sub, dt), now()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn strict_less_than_excludes_exact_boundary() {
        let boundary = now() - Duration::hours(1);
        let value = serde_json::json!(boundary.to_rfc3339());
        let expr = TemporalExpression::datetime().combine(TemporalOp::Sub, TemporalExpression::duration("PT1H"));
        assert!(!compare(&value, &expr, Operator::Lt, now()).unwrap());
    }
}
