//! Relationship Registry: the process-wide (but explicitly `Arc`-passed, see
//! `DESIGN.md`) catalog of relationship rules that the kind resolver and
//! match executor consult. Populated once at startup from a derived schema
//! scan plus a user YAML file, then treated as read-only.

use std::collections::HashMap;
use std::sync::RwLock;

use qgraph_ast::{Comparison, DefaultProp, MatchCriterion, RelationshipRule};
use serde::Deserialize;

use crate::errors::EngineErrorKind;
use crate::prelude::*;
use crate::provider::ResourceProvider;

#[derive(Debug, Default)]
pub struct RelationshipRegistry {
    rules: RwLock<Vec<RelationshipRule>>,
}

impl RelationshipRegistry {
    pub fn new() -> Self {
        RelationshipRegistry::default()
    }

    /// Adds a rule, merging match criteria into an existing entry when one
    /// already exists for `(kindA, kindB, relationship_type)`.
    pub fn add_rule(&self, rule: RelationshipRule) -> Result<()> {
        if rule.kind_a.is_empty() || rule.kind_b.is_empty() || rule.relationship_type.is_empty() {
            return Err(EngineErrorKind::ConfigInvalid(
                "relationship rule is missing kindA, kindB or relationship".to_string(),
            )
            .into());
        }
        if rule.match_criteria.is_empty() {
            return Err(EngineErrorKind::ConfigInvalid(format!(
                "relationship rule {}/{}/{} has no match criteria",
                rule.kind_a, rule.kind_b, rule.relationship_type
            ))
            .into());
        }

        let mut rules = self.rules.write().expect("relationship registry poisoned");
        let existing = rules.iter_mut().find(|r| {
            r.kind_a.eq_ignore_ascii_case(&rule.kind_a)
                && r.kind_b.eq_ignore_ascii_case(&rule.kind_b)
                && r.relationship_type == rule.relationship_type
        });
        match existing {
            Some(existing) => existing.merge_criteria(&rule),
            None => rules.push(rule),
        }
        Ok(())
    }

    pub fn get_rules(&self) -> Vec<RelationshipRule> {
        self.rules.read().expect("relationship registry poisoned").clone()
    }

    pub fn find_rule_by_type(&self, relationship_type: &str) -> Option<RelationshipRule> {
        self.rules
            .read()
            .expect("relationship registry poisoned")
            .iter()
            .find(|r| r.relationship_type == relationship_type)
            .cloned()
    }

    /// Kinds appearing on the opposite side of any rule involving `kind`,
    /// sorted ascending with duplicates removed.
    pub fn potential_kinds_of(&self, kind: &str) -> Vec<String> {
        let rules = self.rules.read().expect("relationship registry poisoned");
        let mut kinds: Vec<String> = rules
            .iter()
            .filter_map(|r| r.other_side(kind))
            .map(str::to_string)
            .collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    /// Builds relationship rules from a `{owning schema name -> field paths}`
    /// map, per the `(\w+)(Name|KeyRef|Ref)$` field-naming convention.
    /// Longer suffixes are tried before shorter ones so `FooKeyRef` resolves
    /// as a `KeyRef` field rather than spuriously matching the trailing `Ref`.
    pub async fn bootstrap_from_schema(
        &self,
        schema_fields: &HashMap<String, Vec<String>>,
        provider: &dyn ResourceProvider,
    ) -> Result<()> {
        const SUFFIXES: [&str; 3] = ["KeyRef", "Name", "Ref"];

        for (owning_kind, field_paths) in schema_fields {
            for field_path in field_paths {
                let terminal = field_path
                    .rsplit('.')
                    .next()
                    .unwrap_or(field_path)
                    .trim_end_matches("[]");

                let matched = SUFFIXES.iter().find_map(|suffix| {
                    terminal
                        .strip_suffix(suffix)
                        .filter(|left| !left.is_empty())
                        .map(|left| (left, *suffix))
                });
                let Some((referenced_singular, suffix)) = matched else {
                    continue;
                };

                let owning_gvr = match provider.find_gvr(owning_kind).await {
                    Ok(gvr) => gvr,
                    Err(err) => {
                        tracing::warn!("skipping schema-derived rule, unknown owning kind `{owning_kind}`: {err}");
                        continue;
                    }
                };
                let referenced_gvr = match provider.find_gvr(referenced_singular).await {
                    Ok(gvr) => gvr,
                    Err(err) => {
                        tracing::warn!(
                            "skipping schema-derived rule, unknown referenced kind `{referenced_singular}`: {err}"
                        );
                        continue;
                    }
                };

                let field_a = if suffix == "Name" {
                    format!("$.{field_path}")
                } else {
                    format!("$.{field_path}.name")
                };

                let rule = RelationshipRule {
                    kind_a: owning_gvr.resource.clone(),
                    kind_b: referenced_gvr.resource.clone(),
                    relationship_type: format!(
                        "{}_INSPEC_{}",
                        referenced_singular.to_uppercase(),
                        owning_kind.to_uppercase()
                    ),
                    match_criteria: vec![MatchCriterion {
                        field_a,
                        field_b: "$.metadata.name".to_string(),
                        comparison: Comparison::ExactMatch,
                        default_props: Vec::new(),
                    }],
                    default_props: Vec::new(),
                };
                self.add_rule(rule)?;
            }
        }
        Ok(())
    }

    /// Loads custom rules from a YAML document of rule entries, expanding
    /// `kindA: '*'` into one rule per kind the provider knows about.
    pub async fn load_custom_rules(
        &self,
        yaml: &str,
        provider: &dyn ResourceProvider,
    ) -> Result<()> {
        let file: RawRelationshipsFile = serde_yaml::from_str(yaml)?;
        for raw in file.relationships {
            if raw.kind_a == "*" {
                for kind in provider.list_resource_kinds().await? {
                    self.add_rule(raw.clone().into_rule(kind.clone(), format!("{}_{}", raw.relationship, kind.to_uppercase())))?;
                }
            } else {
                let kind_a = raw.kind_a.clone();
                let relationship = raw.relationship.clone();
                self.add_rule(raw.into_rule(kind_a, relationship))?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawRelationshipsFile {
    relationships: Vec<RawRule>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawRule {
    #[serde(rename = "kindA")]
    kind_a: String,
    #[serde(rename = "kindB")]
    kind_b: String,
    relationship: String,
    #[serde(rename = "matchCriteria")]
    match_criteria: Vec<RawCriterion>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawCriterion {
    #[serde(rename = "fieldA")]
    field_a: String,
    #[serde(rename = "fieldB")]
    field_b: String,
    #[serde(rename = "comparisonType")]
    comparison_type: Comparison,
    #[serde(rename = "defaultProps", default)]
    default_props: Vec<RawDefaultProp>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawDefaultProp {
    #[serde(rename = "fieldA")]
    field_a: String,
    #[serde(rename = "fieldB")]
    field_b: String,
    default: serde_json::Value,
}

impl RawRule {
    fn into_rule(self, kind_a: String, relationship_type: String) -> RelationshipRule {
        RelationshipRule {
            kind_a,
            kind_b: self.kind_b,
            relationship_type,
            match_criteria: self
                .match_criteria
                .into_iter()
                .map(|c| MatchCriterion {
                    field_a: c.field_a,
                    field_b: c.field_b,
                    comparison: c.comparison_type,
                    default_props: c
                        .default_props
                        .into_iter()
                        .map(|p| DefaultProp {
                            field_a: p.field_a,
                            field_b: p.field_b,
                            default: p.default,
                        })
                        .collect(),
                })
                .collect(),
            default_props: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(a: &str, b: &str, rel: &str) -> RelationshipRule {
        RelationshipRule {
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
        }
    }

    #[test]
    fn potential_kinds_of_is_symmetric() {
        let registry = RelationshipRegistry::new();
        registry.add_rule(rule("services", "pods", "SELECTS")).unwrap();
        assert_eq!(registry.potential_kinds_of("services"), vec!["pods".to_string()]);
        assert_eq!(registry.potential_kinds_of("pods"), vec!["services".to_string()]);
    }

    #[test]
    fn duplicate_rule_merges_criteria_instead_of_duplicating() {
        let registry = RelationshipRegistry::new();
        registry.add_rule(rule("services", "pods", "SELECTS")).unwrap();
        let mut second = rule("services", "pods", "SELECTS");
        second.match_criteria[0].field_a = "$.spec.otherSelector".to_string();
        registry.add_rule(second).unwrap();

        let rules = registry.get_rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].match_criteria.len(), 2);
    }

    #[test]
    fn rule_missing_criteria_is_rejected() {
        let registry = RelationshipRegistry::new();
        let mut bad = rule("services", "pods", "SELECTS");
        bad.match_criteria.clear();
        assert!(registry.add_rule(bad).is_err());
    }
}
