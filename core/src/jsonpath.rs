//! The engine's JSONPath dialect: `$` root, dotted keys, `[N]`
//! indexing, `[*]` wildcard, backslash-escaped dots so map keys that contain a
//! literal dot (`argoproj.io/tracking-id`) survive path splitting.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Key(String),
    Index(usize),
    Wildcard,
}

/// Splits `path` into steps. Leading `$` and `$.` are stripped. Splitting is
/// naive (on every `.`), then consecutive steps are merged back together when
/// the first one ends with a trailing backslash — an "escape repair" pass
/// that turns `argoproj\` + `io/tracking-id` back into one
/// `argoproj.io/tracking-id` step with the backslash dropped.
pub fn compile(path: &str) -> Vec<Step> {
    let trimmed = path.strip_prefix('$').unwrap_or(path);
    let trimmed = trimmed.strip_prefix('.').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Vec::new();
    }

    let raw: Vec<&str> = trimmed.split('.').collect();
    let mut merged: Vec<String> = Vec::with_capacity(raw.len());
    for segment in raw {
        match merged.last_mut() {
            Some(prev) if prev.ends_with('\\') => {
                prev.pop();
                prev.push('.');
                prev.push_str(segment);
            }
            _ => merged.push(segment.to_string()),
        }
    }

    merged.into_iter().flat_map(parse_segment).collect()
}

/// Splits one dot-delimited segment into a key step plus zero or more
/// `[N]`/`[*]` index steps, e.g. `"containers[0]"` -> `Key("containers")`,
/// `Index(0)`.
fn parse_segment(segment: String) -> Vec<Step> {
    let mut steps = Vec::new();
    let mut rest = segment.as_str();

    let key_end = rest.find('[').unwrap_or(rest.len());
    let (key, mut brackets) = rest.split_at(key_end);
    if !key.is_empty() {
        steps.push(Step::Key(key.to_string()));
    }
    rest = brackets;

    while let Some(close) = rest.find(']') {
        let inner = &rest[1..close];
        if inner.is_empty() || inner == "*" {
            // `[]` denotes "this field lives inside an array"; flattening it
            // at evaluation time is the same as a wildcard.
            steps.push(Step::Wildcard);
        } else if let Ok(idx) = inner.parse::<usize>() {
            steps.push(Step::Index(idx));
        }
        rest = &rest[close + 1..];
        brackets = rest;
    }
    let _ = brackets;

    steps
}

/// Resolves `steps` against `root`, fanning out at every [`Step::Wildcard`].
/// Missing keys/out-of-range indices simply yield no matches for that branch,
/// matching the "criterion lookup failures are local, not errors" rule.
pub fn resolve<'a>(root: &'a Value, steps: &[Step]) -> Vec<&'a Value> {
    let mut current = vec![root];
    for step in steps {
        let mut next = Vec::new();
        for value in current {
            match step {
                Step::Key(k) => {
                    if let Some(v) = value.get(k) {
                        next.push(v);
                    }
                }
                Step::Index(i) => {
                    if let Some(v) = value.get(i) {
                        next.push(v);
                    }
                }
                Step::Wildcard => match value {
                    Value::Array(items) => next.extend(items.iter()),
                    Value::Object(map) => next.extend(map.values()),
                    _ => {}
                },
            }
        }
        current = next;
    }
    current
}

/// Convenience over [`compile`] + [`resolve`] for a single dotted path string.
pub fn get<'a>(root: &'a Value, path: &str) -> Vec<&'a Value> {
    resolve(root, &compile(path))
}
