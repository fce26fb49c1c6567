//! Columnar Result Table: tags every bound resource with `(variable,
//! pattern_match_id)` so ORDER BY / SKIP / LIMIT can operate on whole
//! pattern-match groups rather than individual rows.

use std::cmp::Ordering;
use std::collections::HashMap;

use qgraph_ast::{ColumnarRow, OrderItem, Resource, SortDirection};

use crate::jsonpath;

#[derive(Debug, Default)]
pub struct ColumnarTable {
    rows: Vec<ColumnarRow>,
}

#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Number(f64),
    Text(String),
    Missing,
}

impl ColumnarTable {
    pub fn new() -> Self {
        ColumnarTable::default()
    }

    pub fn add_row(&mut self, variable_name: impl Into<String>, pattern_match_id: u64, data: Resource) {
        self.rows.push(ColumnarRow {
            variable_name: variable_name.into(),
            pattern_match_id,
            data,
        });
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = ColumnarRow>) {
        self.rows.extend(rows);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Stable multi-key sort. A field may carry a leading variable token
    /// (`p.age`) to disambiguate which row it applies to in a multi-variable
    /// table; rows from other variables sort as missing for that key.
    pub fn order_by(&mut self, order: &[OrderItem]) {
        if order.is_empty() {
            return;
        }
        self.rows.sort_by(|a, b| {
            for item in order {
                let ka = sort_key(a, &item.field);
                let kb = sort_key(b, &item.field);
                let ord = compare_keys(&ka, &kb, item.direction == SortDirection::Desc);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }

    /// Keeps the first `n` pattern-match groups, in order of first
    /// appearance after sorting. All rows of a kept group are kept; no group
    /// is retained partially.
    pub fn limit(&mut self, n: u64) {
        let keep: Vec<u64> = self.group_order().into_iter().take(n as usize).collect();
        self.retain_groups(&keep);
    }

    pub fn skip(&mut self, n: u64) {
        let keep: Vec<u64> = self.group_order().into_iter().skip(n as usize).collect();
        self.retain_groups(&keep);
    }

    fn group_order(&self) -> Vec<u64> {
        let mut seen = Vec::new();
        for row in &self.rows {
            if !seen.contains(&row.pattern_match_id) {
                seen.push(row.pattern_match_id);
            }
        }
        seen
    }

    fn retain_groups(&mut self, keep: &[u64]) {
        self.rows.retain(|r| keep.contains(&r.pattern_match_id));
    }

    /// Groups rows by variable name, preserving post-sort/limit/skip order.
    pub fn convert_to_query_result(&self) -> HashMap<String, Vec<Resource>> {
        let mut out: HashMap<String, Vec<Resource>> = HashMap::new();
        for row in &self.rows {
            out.entry(row.variable_name.clone()).or_default().push(row.data.clone());
        }
        out
    }

    pub fn rows(&self) -> &[ColumnarRow] {
        &self.rows
    }
}

fn sort_key(row: &ColumnarRow, field: &str) -> SortKey {
    let end = field.find(['.', '[']).unwrap_or(field.len());
    let (head, rest) = field.split_at(end);
    let path = if head == row.variable_name {
        rest.trim_start_matches('.')
    } else if head.is_empty() || !rest.is_empty() && head != row.variable_name && field.contains('.') {
        // field looked like "other_var.path" and doesn't belong to this row
        return SortKey::Missing;
    } else {
        field
    };

    match jsonpath::get(row.data.as_value(), path).into_iter().next() {
        None => SortKey::Missing,
        Some(value) => match value {
            serde_json::Value::Number(n) => SortKey::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => match s.parse::<f64>() {
                Ok(n) => SortKey::Number(n),
                Err(_) => SortKey::Text(s.clone()),
            },
            other => SortKey::Text(other.to_string()),
        },
    }
}

fn compare_keys(a: &SortKey, b: &SortKey, desc: bool) -> Ordering {
    match (a, b) {
        (SortKey::Missing, SortKey::Missing) => Ordering::Equal,
        (SortKey::Missing, _) => Ordering::Greater,
        (_, SortKey::Missing) => Ordering::Less,
        (SortKey::Number(x), SortKey::Number(y)) => {
            let ord = x.partial_cmp(y).unwrap_or(Ordering::Equal);
            if desc { ord.reverse() } else { ord }
        }
        (SortKey::Text(x), SortKey::Text(y)) => {
            let ord = x.cmp(y);
            if desc { ord.reverse() } else { ord }
        }
        (SortKey::Number(_), SortKey::Text(_)) => Ordering::Less,
        (SortKey::Text(_), SortKey::Number(_)) => Ordering::Greater,
    }
}
