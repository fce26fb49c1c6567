//! Match Executor: fetches candidate resources per node pattern, applies
//! relationship rules pairwise, and produces columnar rows tagged with a
//! pattern-match id so groups survive ORDER BY / SKIP / LIMIT.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use qgraph_ast::{
    ColumnarRow, Comparison, KeyValuePair, MatchClause, MatchCriterion, NodePattern, Operator,
    Relationship, RelationshipRule, Resource, WhereValue,
};
use regex::Regex;
use serde_json::Value;

use crate::jsonpath;
use crate::prelude::*;
use crate::provider::ResourceProvider;
use crate::registry::RelationshipRegistry;
use crate::temporal_eval;

/// Builds the (field selector, label selector, namespace) triple the
/// provider needs from a node's literal property list. `namespace` is a
/// reserved property name rather than a label.
fn build_selectors(node: &NodePattern) -> (Option<String>, Option<String>, Option<String>) {
    let mut namespace = None;
    let mut labels = Vec::new();
    for (key, value) in &node.properties {
        if key == "namespace" {
            namespace = value.as_str().map(str::to_string);
            continue;
        }
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        labels.push(format!("{key}={rendered}"));
    }
    let label_selector = (!labels.is_empty()).then(|| labels.join(","));
    (None, label_selector, namespace)
}

async fn fetch_candidates(
    clause: &MatchClause,
    provider: &dyn ResourceProvider,
) -> Result<HashMap<String, Vec<Resource>>> {
    let mut candidates = HashMap::with_capacity(clause.nodes.len());
    for node in &clause.nodes {
        let (field_selector, label_selector, namespace) = build_selectors(node);
        let resources = provider
            .get_k8s_resources(
                &node.kind,
                field_selector.as_deref(),
                label_selector.as_deref(),
                namespace.as_deref(),
            )
            .await?;
        candidates.insert(node.name.clone(), resources);
    }
    Ok(candidates)
}

/// `a` matches `b` honoring the flattening rules in §4.4: arrays flatten
/// (match if any element matches), maps match if any value recurses to a
/// match, primitives compare by equality.
fn values_match(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(items), _) => items.iter().any(|item| values_match(item, b)),
        (_, Value::Array(items)) => items.iter().any(|item| values_match(a, item)),
        (Value::Object(map), _) if !matches!(b, Value::Object(_)) => {
            map.values().any(|v| values_match(v, b))
        }
        (_, Value::Object(map)) if !matches!(a, Value::Object(_)) => {
            map.values().any(|v| values_match(a, v))
        }
        _ => a == b,
    }
}

fn stringify(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn apply_criterion(criterion: &MatchCriterion, left: &Value, right: &Value) -> bool {
    let lhs = jsonpath::get(left, &criterion.field_a);
    let rhs = jsonpath::get(right, &criterion.field_b);

    match criterion.comparison {
        Comparison::ExactMatch => lhs
            .iter()
            .any(|l| rhs.iter().any(|r| values_match(l, r))),
        Comparison::ContainsAll => {
            let (Some(l), Some(r)) = (lhs.first(), rhs.first()) else {
                return false;
            };
            let (Value::Object(lmap), Value::Object(rmap)) = (l, r) else {
                return false;
            };
            if rmap.is_empty() || lmap.is_empty() {
                return false;
            }
            rmap.iter().all(|(k, v)| lmap.get(k) == Some(v))
        }
        Comparison::StringContains => {
            let (Some(l), Some(r)) = (lhs.first(), rhs.first()) else {
                return false;
            };
            stringify(l).contains(&stringify(r))
        }
    }
}

/// True when every criterion on `rule` holds between `left` and `right`,
/// accounting for which side of the rule (`kindA`/`kindB`) each belongs to.
fn rule_matches(rule: &RelationshipRule, left_is_kind_a: bool, left: &Value, right: &Value) -> bool {
    let (a, b) = if left_is_kind_a { (left, right) } else { (right, left) };
    rule.match_criteria.iter().all(|c| apply_criterion(c, a, b))
}

fn rules_for_pair<'a>(
    registry: &'a RelationshipRegistry,
    left_kind: &str,
    right_kind: &str,
) -> Vec<(RelationshipRule, bool)> {
    registry
        .get_rules()
        .into_iter()
        .filter_map(|rule| {
            if rule.kind_a.eq_ignore_ascii_case(left_kind) && rule.kind_b.eq_ignore_ascii_case(right_kind) {
                Some((rule, true))
            } else if rule.kind_a.eq_ignore_ascii_case(right_kind) && rule.kind_b.eq_ignore_ascii_case(left_kind) {
                Some((rule, false))
            } else {
                None
            }
        })
        .collect()
}

fn dedup_by_name(resources: &mut Vec<Resource>) {
    let mut seen = std::collections::HashSet::new();
    resources.retain(|r| match r.name() {
        Some(name) => seen.insert(name.to_string()),
        None => true,
    });
}

/// Executes one MATCH clause: fetches every node's candidates, then — using
/// the first declared node as the join's root — walks the relationship graph
/// transitively from there (breadth-first), pruning each newly-reached
/// node's candidates against every resource already bound to its matched
/// neighbor. Rows sharing a root resource share a `pattern_match_id`. Unlike
/// a star centered on the root, this reaches every node connected to it
/// through any chain of relationships, not just its direct neighbors — a
/// 3-node chain `(a)-(b)-(c)` binds `c` against `b`, not just `b` against
/// `a`.
pub async fn execute_match_clause(
    clause: &MatchClause,
    provider: &dyn ResourceProvider,
    registry: &RelationshipRegistry,
) -> Result<Vec<ColumnarRow>> {
    let candidates = fetch_candidates(clause, provider).await?;
    let node_kind: HashMap<&str, &str> = clause.nodes.iter().map(|n| (n.name.as_str(), n.kind.as_str())).collect();

    if clause.relationships.is_empty() {
        let mut rows = Vec::new();
        let mut next_id = 0u64;
        for node in &clause.nodes {
            for resource in candidates.get(&node.name).into_iter().flatten() {
                rows.push(ColumnarRow {
                    variable_name: node.name.clone(),
                    pattern_match_id: next_id,
                    data: resource.clone(),
                });
                next_id += 1;
            }
        }
        return Ok(rows);
    }

    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for rel in &clause.relationships {
        adjacency.entry(rel.left_node.as_str()).or_default().push(rel.right_node.as_str());
        adjacency.entry(rel.right_node.as_str()).or_default().push(rel.left_node.as_str());
    }

    let root = &clause.nodes[0].name;
    let mut rows = Vec::new();
    let root_candidates = candidates.get(root).cloned().unwrap_or_default();

    for (group_id, root_resource) in root_candidates.iter().enumerate() {
        let group_id = group_id as u64;
        rows.push(ColumnarRow {
            variable_name: root.clone(),
            pattern_match_id: group_id,
            data: root_resource.clone(),
        });

        let mut bound: HashMap<&str, Vec<Resource>> = HashMap::new();
        bound.insert(root.as_str(), vec![root_resource.clone()]);
        let mut visited: std::collections::HashSet<&str> = std::collections::HashSet::new();
        visited.insert(root.as_str());
        let mut queue: std::collections::VecDeque<&str> = std::collections::VecDeque::new();
        queue.push_back(root.as_str());

        while let Some(u) = queue.pop_front() {
            let Some(neighbors) = adjacency.get(u) else { continue };
            for &v in neighbors {
                if visited.contains(v) {
                    continue;
                }
                visited.insert(v);

                let u_kind = node_kind.get(u).copied().unwrap_or_default();
                let v_kind = node_kind.get(v).copied().unwrap_or_default();
                let rules = rules_for_pair(registry, u_kind, v_kind);
                let u_resources = bound.get(u).cloned().unwrap_or_default();

                let mut matched: Vec<Resource> = Vec::new();
                if !rules.is_empty() {
                    matched = candidates
                        .get(v)
                        .into_iter()
                        .flatten()
                        .filter(|candidate| {
                            u_resources.iter().any(|u_resource| {
                                rules.iter().any(|(rule, u_is_kind_a)| {
                                    rule_matches(rule, *u_is_kind_a, u_resource.as_value(), candidate.as_value())
                                })
                            })
                        })
                        .cloned()
                        .collect();
                    dedup_by_name(&mut matched);
                }

                for resource in &matched {
                    rows.push(ColumnarRow {
                        variable_name: v.to_string(),
                        pattern_match_id: group_id,
                        data: resource.clone(),
                    });
                }
                bound.insert(v, matched);
                queue.push_back(v);
            }
        }
    }

    Ok(rows)
}

/// Evaluates WHERE filters per row; a row is dropped if its own variable's
/// predicate fails. Wildcard paths (`foo[*].bar`) OR the predicate across
/// every resolved element.
pub fn apply_where(
    rows: Vec<ColumnarRow>,
    filters: &[KeyValuePair],
    now: DateTime<Utc>,
) -> Result<Vec<ColumnarRow>> {
    let mut kept = Vec::with_capacity(rows.len());
    for row in rows {
        let mut matches = true;
        for filter in filters {
            let Some((var, rest)) = split_leading_var(&filter.key) else {
                continue;
            };
            if var != row.variable_name {
                continue;
            }
            if !evaluate_filter(filter, rest, &row.data, now)? {
                matches = false;
                break;
            }
        }
        if matches {
            kept.push(row);
        }
    }
    Ok(kept)
}

fn split_leading_var(key: &str) -> Option<(&str, &str)> {
    let end = key.find(['.', '[']).unwrap_or(key.len());
    if end == 0 {
        return None;
    }
    Some((&key[..end], &key[end..]))
}

fn evaluate_filter(filter: &KeyValuePair, path: &str, resource: &Resource, now: DateTime<Utc>) -> Result<bool> {
    let candidates = jsonpath::get(resource.as_value(), path.trim_start_matches('.'));
    let mut any = false;
    for candidate in &candidates {
        let hit = match &filter.value {
            WhereValue::Temporal(expr) => temporal_eval::compare(candidate, expr, filter.operator, now)?,
            WhereValue::Literal(expected) => compare_literal(candidate, expected, filter.operator)?,
        };
        if hit {
            any = true;
            break;
        }
    }
    Ok(any != filter.is_negated)
}

fn compare_literal(actual: &Value, expected: &Value, operator: Operator) -> Result<bool> {
    Ok(match operator {
        Operator::Equals => actual == expected,
        Operator::NotEquals => actual != expected,
        Operator::Contains => stringify(actual).contains(&stringify(expected)),
        Operator::Regex => {
            let Some(pattern) = expected.as_str() else {
                return Ok(false);
            };
            regex_matches(&stringify(actual), pattern)
        }
        Operator::Gt | Operator::Lt | Operator::Gte | Operator::Lte => {
            let (Some(a), Some(b)) = (actual.as_f64(), expected.as_f64()) else {
                return Ok(false);
            };
            match operator {
                Operator::Gt => a > b,
                Operator::Lt => a < b,
                Operator::Gte => a >= b,
                Operator::Lte => a <= b,
                _ => unreachable!(),
            }
        }
    })
}

/// Evaluates `WHERE ... =~ pattern`. A pattern that fails to compile matches
/// nothing rather than erroring the whole query out — a malformed literal
/// shouldn't abort a MATCH that would otherwise succeed.
fn regex_matches(haystack: &str, pattern: &str) -> bool {
    match Regex::new(pattern) {
        Ok(re) => re.is_match(haystack),
        Err(_) => false,
    }
}
