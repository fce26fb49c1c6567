//! Kind Resolver: maps singular/plural/case-variant kind names to a canonical
//! `(group, resource)` via the provider, and caches the relationship-graph
//! intersection used by kindless expansion.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::errors::EngineErrorKind;
use crate::prelude::*;
use crate::provider::{Gvr, ResourceProvider};
use crate::registry::RelationshipRegistry;

#[derive(Debug, Default)]
pub struct KindResolver {
    cache: RwLock<HashMap<String, Vec<String>>>,
}

impl KindResolver {
    pub fn new() -> Self {
        KindResolver::default()
    }

    async fn resolve_gvr(&self, kind: &str, provider: &dyn ResourceProvider) -> Result<Gvr> {
        match provider.find_gvr(kind).await {
            Ok(gvr) => Ok(gvr),
            Err(err) => {
                let message = err.to_string();
                if message.contains("ambiguous") {
                    let qualified = format!("core.{kind}");
                    tracing::debug!("`{kind}` is ambiguous, retrying as `{qualified}`");
                    provider.find_gvr(&qualified).await.map_err(|_| {
                        EngineErrorKind::KindAmbiguous(kind.to_string(), message).into()
                    })
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Potential kinds on the other side of any relationship involving
    /// `source_kind`, cached under the canonical `"<resource>.<group>"` key.
    pub async fn find_potential_kinds(
        &self,
        source_kind: &str,
        registry: &RelationshipRegistry,
        provider: &dyn ResourceProvider,
    ) -> Result<Vec<String>> {
        let lower = source_kind.to_lowercase();
        let gvr = self.resolve_gvr(&lower, provider).await?;
        let key = gvr.cache_key();

        if let Some(hit) = self.cache.read().expect("kind resolver cache poisoned").get(&key) {
            return Ok(hit.clone());
        }

        let mut kinds = registry.potential_kinds_of(&gvr.resource);
        kinds.sort();

        self.cache
            .write()
            .expect("kind resolver cache poisoned")
            .insert(key, kinds.clone());
        Ok(kinds)
    }

    /// Intersection of `find_potential_kinds` across every known (non-kindless)
    /// kind neighboring a kindless node. Empty `known_kinds` signals "no
    /// rewrite needed" per `spec` §4.2.
    pub async fn find_potential_kinds_intersection(
        &self,
        known_kinds: &[String],
        registry: &RelationshipRegistry,
        provider: &dyn ResourceProvider,
    ) -> Result<Vec<String>> {
        if known_kinds.is_empty() {
            return Ok(Vec::new());
        }

        let mut kinds_iter = known_kinds.iter();
        let first = kinds_iter.next().expect("checked non-empty above");
        let mut intersection: HashSet<String> = self
            .find_potential_kinds(first, registry, provider)
            .await?
            .into_iter()
            .collect();

        for kind in kinds_iter {
            let kinds: HashSet<String> = self
                .find_potential_kinds(kind, registry, provider)
                .await?
                .into_iter()
                .collect();
            intersection = intersection.intersection(&kinds).cloned().collect();
        }

        if intersection.is_empty() {
            return Err(EngineErrorKind::KindIntersectionEmpty.into());
        }

        let mut result: Vec<String> = intersection.into_iter().collect();
        result.sort();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::InMemoryProvider;
    use qgraph_ast::{Comparison, MatchCriterion, RelationshipRule};

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
    async fn intersection_of_two_kinds_narrows_candidates() {
        let registry = registry_with(&[
            ("deployments", "services", "EXPOSES"),
            ("pods", "services", "EXPOSES"),
            ("daemonsets", "services", "EXPOSES"),
            ("daemonsets", "pods", "MANAGES"),
            ("replicasets", "pods", "MANAGES"),
            ("replicasets", "services", "EXPOSES"),
        ]);
        let provider = InMemoryProvider::new();
        let resolver = KindResolver::new();

        let services_only = resolver
            .find_potential_kinds("services", &registry, &provider)
            .await
            .unwrap();
        assert_eq!(
            services_only,
            vec!["daemonsets", "deployments", "pods", "replicasets"]
        );

        let intersection = resolver
            .find_potential_kinds_intersection(
                &["services".to_string(), "pods".to_string()],
                &registry,
                &provider,
            )
            .await
            .unwrap();
        assert_eq!(intersection, vec!["daemonsets", "replicasets"]);
    }

    #[tokio::test]
    async fn empty_known_kinds_signals_no_rewrite_needed() {
        let registry = registry_with(&[("deployments", "services", "EXPOSES")]);
        let provider = InMemoryProvider::new();
        let resolver = KindResolver::new();
        let result = resolver
            .find_potential_kinds_intersection(&[], &registry, &provider)
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn disjoint_kinds_yield_empty_intersection_error() {
        let registry = registry_with(&[
            ("deployments", "services", "EXPOSES"),
            ("jobs", "configmaps", "READS"),
        ]);
        let provider = InMemoryProvider::new();
        let resolver = KindResolver::new();
        let result = resolver
            .find_potential_kinds_intersection(
                &["services".to_string(), "configmaps".to_string()],
                &registry,
                &provider,
            )
            .await;
        assert!(result.is_err());
    }
}
