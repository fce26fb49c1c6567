use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    ExactMatch,
    ContainsAll,
    StringContains,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCriterion {
    pub field_a: String,
    pub field_b: String,
    pub comparison: Comparison,
    pub default_props: Vec<DefaultProp>,
}

/// A value to inject into a created resource when a referenced field is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultProp {
    pub field_a: String,
    pub field_b: String,
    pub default: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipRule {
    pub kind_a: String,
    pub kind_b: String,
    pub relationship_type: String,
    pub match_criteria: Vec<MatchCriterion>,
    pub default_props: Vec<DefaultProp>,
}

impl RelationshipRule {
    /// True when this rule connects `kind` to some other kind, either way round.
    pub fn involves(&self, kind: &str) -> bool {
        self.kind_a.eq_ignore_ascii_case(kind) || self.kind_b.eq_ignore_ascii_case(kind)
    }

    /// The kind on the other side of `kind` in this rule, if `kind` participates.
    pub fn other_side(&self, kind: &str) -> Option<&str> {
        if self.kind_a.eq_ignore_ascii_case(kind) {
            Some(self.kind_b.as_str())
        } else if self.kind_b.eq_ignore_ascii_case(kind) {
            Some(self.kind_a.as_str())
        } else {
            None
        }
    }

    /// Merge another rule's match criteria into this one, per the registry's
    /// "duplicates merge match criteria" uniqueness rule.
    pub fn merge_criteria(&mut self, other: &RelationshipRule) {
        for criterion in &other.match_criteria {
            if !self.match_criteria.contains(criterion) {
                self.match_criteria.push(criterion.clone());
            }
        }
        for prop in &other.default_props {
            if !self.default_props.contains(prop) {
                self.default_props.push(prop.clone());
            }
        }
    }
}
