//! Ties the registry, kind resolver, rewriter, match executor, columnar
//! table, mutator and temporal evaluator together into the single-query
//! pipeline. This is the "core engine" entry point; the multi-context
//! dispatcher (`crate::multi_context`) runs it once per cluster context.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use qgraph_ast::{Clause, Expression, Resource};

use crate::columnar::ColumnarTable;
use crate::kind_resolver::KindResolver;
use crate::match_executor;
use crate::mutator;
use crate::prelude::*;
use crate::provider::ResourceProvider;
use crate::registry::RelationshipRegistry;
use crate::rewriter;

/// `{ variable -> bound resources }`, in post-ORDER BY/SKIP/LIMIT order.
pub type QueryResult = HashMap<String, Vec<Resource>>;

/// Runs every MATCH clause in textual order, applies WHERE, runs
/// SET/DELETE/CREATE, then ORDER BY/SKIP/LIMIT from the trailing RETURN
/// clause. MATCH clauses execute in textual order; SET/DELETE/CREATE run
/// after MATCH; RETURN's ordering and pagination always apply last.
pub async fn execute(
    expr: &Expression,
    provider: &dyn ResourceProvider,
    registry: &RelationshipRegistry,
    resolver: &KindResolver,
    now: DateTime<Utc>,
) -> Result<QueryResult> {
    if let Some(branches) = rewriter::rewrite(expr, registry, resolver, provider).await? {
        let mut merged = QueryResult::new();
        for branch in &branches {
            let result = Box::pin(execute(branch, provider, registry, resolver, now)).await?;
            merged.extend(result);
        }
        return Ok(merged);
    }

    let mut table = ColumnarTable::new();
    for clause in expr.match_clauses() {
        let rows = match_executor::execute_match_clause(clause, provider, registry).await?;
        table.extend(rows);
    }

    for clause in &expr.clauses {
        if let Clause::Where(w) = clause {
            let filtered = match_executor::apply_where(table.rows().to_vec(), &w.filters, now)?;
            table = ColumnarTable::new();
            table.extend(filtered);
        }
    }

    for clause in &expr.clauses {
        match clause {
            Clause::Set(set) => {
                for item in &set.items {
                    apply_set_item(&mut table, item, provider).await?;
                }
            }
            Clause::Delete(delete) => {
                for variable in &delete.variables {
                    for row in table.rows().to_vec() {
                        if &row.variable_name != variable {
                            continue;
                        }
                        let kind = row.data.kind().unwrap_or_default().to_string();
                        let name = row.data.name().unwrap_or_default().to_string();
                        provider.delete_k8s_resource(&kind, &name, row.data.namespace()).await?;
                    }
                }
            }
            Clause::Create(create) => {
                let body = serde_json::json!({
                    "kind": create.kind,
                    "metadata": {
                        "namespace": create.namespace,
                    },
                });
                let mut body = body;
                if let Some(map) = body.as_object_mut() {
                    for (key, value) in &create.properties {
                        map.insert(key.clone(), value.clone());
                    }
                }
                mutator::apply_default_props(&mut body, &create.kind, &registry.get_rules());
                let created = provider.create_k8s_resource(&create.kind, create.namespace.as_deref(), body).await?;
                table.add_row(create.variable.clone(), table.len() as u64, created);
            }
            _ => {}
        }
    }

    if let Some(Clause::Return(ret)) = expr.clauses.iter().find(|c| matches!(c, Clause::Return(_))) {
        table.order_by(&ret.order_by);
        if let Some(skip) = ret.skip {
            table.skip(skip);
        }
        if let Some(limit) = ret.limit {
            table.limit(limit);
        }
    }

    Ok(table.convert_to_query_result())
}

/// Compiles and applies one `SET` item against every currently-bound row of
/// its variable, patching through the provider then mirroring the change
/// onto the in-memory copy.
async fn apply_set_item(
    table: &mut ColumnarTable,
    item: &qgraph_ast::SetItem,
    provider: &dyn ResourceProvider,
) -> Result<()> {
    let mut rows = table.rows().to_vec();
    for row in rows.iter_mut() {
        if row.variable_name != item.variable {
            continue;
        }
        let ops = mutator::compile_set_item(item, &row.data)?;
        let patch_json = serde_json::to_value(json_patch::Patch(ops))?;
        let kind = row.data.kind().unwrap_or_default().to_string();
        let name = row.data.name().unwrap_or_default().to_string();
        provider
            .patch_k8s_resource(&kind, &name, row.data.namespace(), patch_json)
            .await?;
        mutator::apply_in_memory(&mut row.data, item);
    }
    *table = ColumnarTable::new();
    table.extend(rows);
    Ok(())
}
