//! Query Rewriter: expands kindless patterns into a union of fully-kinded
//! expressions, one per candidate kind.
//!
//! Each branch is built as a Rust struct clone directly, honoring the
//! `__exp__<i>` variable/alias naming contract — no synthetic text
//! representation, no re-parse, so there is no quoting choice left to be
//! inconsistent between kindless and non-kindless paths.

use std::collections::{HashMap, HashSet};

use qgraph_ast::{validate_match_clause, Aggregate, Expression};

use crate::kind_resolver::KindResolver;
use crate::prelude::*;
use crate::provider::ResourceProvider;
use crate::registry::RelationshipRegistry;

/// `None` means "no kindless nodes, proceed with the original expression
/// unchanged".
pub async fn rewrite(
    expr: &Expression,
    registry: &RelationshipRegistry,
    resolver: &KindResolver,
    provider: &dyn ResourceProvider,
) -> Result<Option<Vec<Expression>>> {
    for clause in expr.match_clauses() {
        validate_match_clause(clause)?;
    }

    let kindless_names: HashSet<&str> = expr
        .all_node_patterns()
        .filter(|n| n.is_kindless())
        .map(|n| n.name.as_str())
        .collect();
    if kindless_names.is_empty() {
        return Ok(None);
    }

    let node_kind_by_name: HashMap<&str, &str> = expr
        .all_node_patterns()
        .map(|n| (n.name.as_str(), n.kind.as_str()))
        .collect();

    let mut known_kinds: Vec<String> = expr
        .all_relationships()
        .flat_map(|r| r.endpoints())
        .filter_map(|name| node_kind_by_name.get(name).copied())
        .filter(|kind| !kind.is_empty())
        .map(str::to_string)
        .collect();
    known_kinds.sort();
    known_kinds.dedup();

    let candidates = resolver
        .find_potential_kinds_intersection(&known_kinds, registry, provider)
        .await?;

    let all_names: Vec<String> = expr.all_node_patterns().map(|n| n.name.clone()).collect();

    let branches = candidates
        .iter()
        .enumerate()
        .map(|(i, kind)| expand_branch(expr, &kindless_names, &all_names, kind, i))
        .collect();
    Ok(Some(branches))
}

fn expand_branch(
    expr: &Expression,
    kindless_names: &HashSet<&str>,
    all_names: &[String],
    candidate_kind: &str,
    index: usize,
) -> Expression {
    let renamed: HashMap<String, String> = all_names
        .iter()
        .map(|name| (name.clone(), format!("{name}__exp__{index}")))
        .collect();

    let mut branch = expr.clone();
    for clause in &mut branch.clauses {
        use qgraph_ast::Clause::*;
        match clause {
            Match(m) => {
                for node in &mut m.nodes {
                    if kindless_names.contains(node.name.as_str()) {
                        node.kind = candidate_kind.to_string();
                    }
                    if let Some(new_name) = renamed.get(&node.name) {
                        node.name = new_name.clone();
                    }
                }
                for rel in &mut m.relationships {
                    if let Some(new_name) = renamed.get(&rel.left_node) {
                        rel.left_node = new_name.clone();
                    }
                    if let Some(new_name) = renamed.get(&rel.right_node) {
                        rel.right_node = new_name.clone();
                    }
                }
            }
            Where(w) => {
                for filter in &mut w.filters {
                    filter.key = rename_path_prefix(&filter.key, &renamed);
                }
            }
            Set(s) => {
                for item in &mut s.items {
                    if let Some(new_name) = renamed.get(&item.variable) {
                        item.variable = new_name.clone();
                    }
                }
            }
            Delete(d) => {
                for var in &mut d.variables {
                    if let Some(new_name) = renamed.get(var) {
                        *var = new_name.clone();
                    }
                }
            }
            Create(c) => {
                if let Some(new_name) = renamed.get(&c.variable) {
                    c.variable = new_name.clone();
                }
            }
            Return(r) => {
                for item in &mut r.items {
                    item.json_path = rename_path_prefix(&item.json_path, &renamed);
                    item.alias = Some(match (&item.aggregate, &item.alias) {
                        (Some(agg), Some(alias)) => {
                            format!("__exp__{}__{}__{}", aggregate_tag(*agg), alias, index)
                        }
                        (Some(agg), None) => format!(
                            "__exp__{}__{}__{}",
                            aggregate_tag(*agg),
                            path_underscored(&item.json_path),
                            index
                        ),
                        (None, Some(alias)) => format!("{alias}__exp__{index}"),
                        (None, None) => return_item_identity_alias(&item.json_path, index),
                    });
                }
            }
        }
    }
    branch
}

fn aggregate_tag(agg: Aggregate) -> &'static str {
    match agg {
        Aggregate::Count => "count",
        Aggregate::Sum => "sum",
        Aggregate::Avg => "avg",
        Aggregate::Min => "min",
        Aggregate::Max => "max",
    }
}

fn path_underscored(path: &str) -> String {
    path.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

fn return_item_identity_alias(path: &str, index: usize) -> String {
    format!("{}__exp__{}", path_underscored(path), index)
}

/// Replaces the leading variable token of a dotted path (`x.metadata.name`,
/// `x[*].spec.foo`) with its renamed counterpart.
fn rename_path_prefix(path: &str, renamed: &HashMap<String, String>) -> String {
    let end = path.find(['.', '[']).unwrap_or(path.len());
    let (head, rest) = path.split_at(end);
    match renamed.get(head) {
        Some(new_head) => format!("{new_head}{rest}"),
        None => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::InMemoryProvider;
    use qgraph_ast::{
        Clause, Comparison, MatchClause, MatchCriterion, NodePattern, Relationship,
        RelationshipDirection, RelationshipRule, ReturnClause, ReturnItem,
    };

    fn registry_with(pairs: &[(&str, &str, &str)]) -> RelationshipRegistry {
        let registry = RelationshipRegistry::new();
        for (a, b, rel) in pairs {
            registry
                .add_rule(RelationshipRule {
                    kind_a: a.to_string(),
                    kind_b: b.to_string(),
                    relationship_type: rel.to_string(),
                    match_criteria: vec![MatchCriterion {
                        field_a: "$.spec.selector".to_string(),
                        field_b: "$.metadata.labels".to_string(),
                        comparison: Comparison::ContainsAll,
                        default_props: Vec::new(),
                    }],
                    default_props: Vec::new(),
                })
                .unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn kindless_expansion_emits_one_branch_per_candidate() {
        let registry = registry_with(&[
            ("deployments", "services", "EXPOSES"),
            ("pods", "services", "EXPOSES"),
            ("replicasets", "services", "EXPOSES"),
        ]);
        let provider = InMemoryProvider::new();
        let resolver = KindResolver::new();

        let expr = Expression {
            clauses: vec![
                Clause::Match(MatchClause {
                    nodes: vec![NodePattern::new("x", ""), NodePattern::new("s", "services")],
                    relationships: vec![Relationship {
                        left_node: "x".to_string(),
                        right_node: "s".to_string(),
                        direction: RelationshipDirection::Right,
                        properties: vec![],
                    }],
                }),
                Clause::Return(ReturnClause {
                    items: vec![ReturnItem {
                        json_path: "x.metadata.name".to_string(),
                        alias: None,
                        aggregate: None,
                    }],
                    order_by: vec![],
                    skip: None,
                    limit: None,
                }),
            ],
            contexts: vec![],
        };

        let branches = rewrite(&expr, &registry, &resolver, &provider)
            .await
            .unwrap()
            .expect("expected kindless expansion");
        assert_eq!(branches.len(), 3);

        let Clause::Match(m) = &branches[0].clauses[0] else {
            panic!("expected match clause");
        };
        assert_eq!(m.nodes[0].name, "x__exp__0");
        assert_eq!(m.nodes[0].kind, "deployments");
        assert_eq!(m.nodes[1].name, "s__exp__0");

        let Clause::Return(r) = &branches[0].clauses[1] else {
            panic!("expected return clause");
        };
        assert_eq!(r.items[0].json_path, "x__exp__0.metadata.name");
    }

    #[tokio::test]
    async fn no_kindless_nodes_returns_none() {
        let registry = RelationshipRegistry::new();
        let provider = InMemoryProvider::new();
        let resolver = KindResolver::new();
        let expr = Expression {
            clauses: vec![Clause::Match(MatchClause {
                nodes: vec![NodePattern::new("p", "pods")],
                relationships: vec![],
            })],
            contexts: vec![],
        };
        assert!(rewrite(&expr, &registry, &resolver, &provider)
            .await
            .unwrap()
            .is_none());
    }
}
