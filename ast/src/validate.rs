use std::collections::{HashMap, HashSet};

use crate::errors::AstError;
use crate::model::{Expression, MatchClause, NodePattern};

/// Structural invariants over a parsed match clause:
/// - every relationship references two node patterns that exist in the
///   enclosing MATCH's node list ([`AstError::UnknownNode`]),
/// - a kindless node must participate in at least one relationship
///   ([`AstError::KindlessStandalone`]),
/// - two kindless nodes may not be directly related
///   ([`AstError::KindlessChain`]).
pub fn validate_match_clause(clause: &MatchClause) -> Result<(), AstError> {
    let by_name: HashMap<&str, &NodePattern> =
        clause.nodes.iter().map(|n| (n.name.as_str(), n)).collect();

    let mut related: HashSet<&str> = HashSet::new();
    for rel in &clause.relationships {
        let left = by_name
            .get(rel.left_node.as_str())
            .ok_or_else(|| AstError::UnknownNode(rel.left_node.clone()))?;
        let right = by_name
            .get(rel.right_node.as_str())
            .ok_or_else(|| AstError::UnknownNode(rel.right_node.clone()))?;
        related.insert(rel.left_node.as_str());
        related.insert(rel.right_node.as_str());

        if left.is_kindless() && right.is_kindless() {
            return Err(AstError::KindlessChain(
                rel.left_node.clone(),
                rel.right_node.clone(),
            ));
        }
    }

    for node in &clause.nodes {
        if node.is_kindless() && !related.contains(node.name.as_str()) {
            return Err(AstError::KindlessStandalone(node.name.clone()));
        }
    }

    Ok(())
}

pub fn validate_expression(expr: &Expression) -> Result<(), AstError> {
    for clause in expr.match_clauses() {
        validate_match_clause(clause)?;
    }
    Ok(())
}
