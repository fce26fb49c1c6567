//! Multi-Context Dispatcher: runs one rewritten expression against several
//! cluster contexts and merges the results. Contexts run sequentially; a
//! failure on any context aborts the whole dispatch — there is no
//! partial-context result.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use qgraph_ast::{Clause, Expression};

use crate::kind_resolver::KindResolver;
use crate::prelude::*;
use crate::provider::ResourceProvider;
use crate::query::{self, QueryResult};
use crate::registry::RelationshipRegistry;

/// Prefixes every variable name occurring in `expr` with `"{context}_"`, the
/// way [`crate::rewriter`] suffixes them with `__exp__<i>` — same shape of
/// problem (rename a variable everywhere it's referenced), different naming
/// contract.
fn prefix_variables(expr: &Expression, context: &str) -> Expression {
    let prefix = format!("{context}_");
    let names: Vec<String> = expr.all_node_patterns().map(|n| n.name.clone()).collect();
    let renamed: HashMap<String, String> =
        names.into_iter().map(|n| (n.clone(), format!("{prefix}{n}"))).collect();

    let mut out = expr.clone();
    for clause in &mut out.clauses {
        match clause {
            Clause::Match(m) => {
                for node in &mut m.nodes {
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
            Clause::Where(w) => {
                for filter in &mut w.filters {
                    filter.key = rename_prefix(&filter.key, &renamed);
                }
            }
            Clause::Set(s) => {
                for item in &mut s.items {
                    if let Some(new_name) = renamed.get(&item.variable) {
                        item.variable = new_name.clone();
                    }
                }
            }
            Clause::Delete(d) => {
                for var in &mut d.variables {
                    if let Some(new_name) = renamed.get(var) {
                        *var = new_name.clone();
                    }
                }
            }
            Clause::Create(c) => {
                if let Some(new_name) = renamed.get(&c.variable) {
                    c.variable = new_name.clone();
                }
            }
            Clause::Return(r) => {
                for item in &mut r.items {
                    item.json_path = rename_prefix(&item.json_path, &renamed);
                }
            }
        }
    }
    out
}

fn rename_prefix(path: &str, renamed: &HashMap<String, String>) -> String {
    let end = path.find(['.', '[']).unwrap_or(path.len());
    let (head, rest) = path.split_at(end);
    match renamed.get(head) {
        Some(new_head) => format!("{new_head}{rest}"),
        None => path.to_string(),
    }
}

/// One cluster context: a name (used for the `c_` prefix) paired with the
/// [`ResourceProvider`] that serves it.
pub struct Context<'a> {
    pub name: String,
    pub provider: &'a dyn ResourceProvider,
}

/// Runs `expr` once per entry in `contexts`, in order, merging the resulting
/// `{variable -> resources}` maps. Each context's variables are disjoint by
/// construction (distinct `c_` prefixes), so merging is a plain union.
pub async fn dispatch(
    expr: &Expression,
    contexts: &[Context<'_>],
    registry: &RelationshipRegistry,
    resolver: &KindResolver,
    now: DateTime<Utc>,
) -> Result<QueryResult> {
    let mut merged = QueryResult::new();
    for context in contexts {
        let prefixed = prefix_variables(expr, &context.name);
        let result = query::execute(&prefixed, context.provider, registry, resolver, now).await?;
        merged.extend(result);
    }
    Ok(merged)
}
