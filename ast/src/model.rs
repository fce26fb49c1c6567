use serde::{Deserialize, Serialize};

use crate::filter::KeyValuePair;
use crate::resource::Resource;

/// A pattern node. `kind` is empty for a "kindless" node, resolved later by the
/// kind resolver and query rewriter. Identity within a MATCH is `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePattern {
    pub name: String,
    pub kind: String,
    pub properties: Vec<(String, serde_json::Value)>,
    pub is_anonymous: bool,
}

impl NodePattern {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        NodePattern {
            name: name.into(),
            kind: kind.into(),
            properties: Vec::new(),
            is_anonymous: false,
        }
    }

    pub fn is_kindless(&self) -> bool {
        self.kind.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationshipDirection {
    Left,
    Right,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub left_node: String,
    pub right_node: String,
    pub direction: RelationshipDirection,
    pub properties: Vec<(String, serde_json::Value)>,
}

impl Relationship {
    /// The two endpoint variable names, in no particular order.
    pub fn endpoints(&self) -> [&str; 2] {
        [self.left_node.as_str(), self.right_node.as_str()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregate {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnItem {
    pub json_path: String,
    pub alias: Option<String>,
    pub aggregate: Option<Aggregate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub field: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MatchClause {
    pub nodes: Vec<NodePattern>,
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WhereClause {
    pub filters: Vec<KeyValuePair>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetItem {
    pub variable: String,
    /// Already split on unescaped dots; an element may itself contain a
    /// literal dot when the source path escaped it (`argoproj\.io`).
    pub path_parts: Vec<String>,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SetClause {
    pub items: Vec<SetItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DeleteClause {
    pub variables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateClause {
    pub variable: String,
    pub kind: String,
    pub namespace: Option<String>,
    pub properties: Vec<(String, serde_json::Value)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReturnClause {
    pub items: Vec<ReturnItem>,
    pub order_by: Vec<OrderItem>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Clause {
    Match(MatchClause),
    Where(WhereClause),
    Set(SetClause),
    Delete(DeleteClause),
    Create(CreateClause),
    Return(ReturnClause),
}

/// A parsed query, ready for the rewriter/executor. Construction of this value
/// from query text is out of scope here — callers (a parser, or in this
/// crate's tests, hand-built fixtures) hand the engine one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Expression {
    pub clauses: Vec<Clause>,
    /// Cluster context identifiers for multi-context dispatch; empty means
    /// "current/default context".
    pub contexts: Vec<String>,
}

impl Expression {
    pub fn match_clauses(&self) -> impl Iterator<Item = &MatchClause> {
        self.clauses.iter().filter_map(|c| match c {
            Clause::Match(m) => Some(m),
            _ => None,
        })
    }

    pub fn all_node_patterns(&self) -> impl Iterator<Item = &NodePattern> {
        self.match_clauses().flat_map(|m| m.nodes.iter())
    }

    pub fn all_relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.match_clauses().flat_map(|m| m.relationships.iter())
    }
}

/// One complete binding of a MATCH clause's variables to concrete resources,
/// tagged for the columnar result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnarRow {
    pub variable_name: String,
    pub pattern_match_id: u64,
    pub data: Resource,
}
