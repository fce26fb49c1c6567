//! A deterministic in-memory [`ResourceProvider`] double, used across this
//! crate's own test suite in place of a real cluster client — the concrete
//! cluster client is an external collaborator, never built here.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use qgraph_ast::Resource;

use crate::errors::EngineErrorKind;
use crate::prelude::*;
use crate::provider::{Gvr, ResourceProvider};

/// Resources seeded per kind, served back verbatim by `get_k8s_resources`.
/// Selectors are accepted but not filtered server-side — callers that need
/// selector-aware fixtures seed only the resources that should match.
#[derive(Debug, Default)]
pub struct InMemoryProvider {
    resources: RwLock<HashMap<String, Vec<Resource>>>,
    /// Kinds for which `find_gvr` should report "ambiguous" once, then accept
    /// a `core.`-prefixed retry. Exercises the kind resolver's retry path.
    ambiguous_kinds: RwLock<Vec<String>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        InMemoryProvider::default()
    }

    pub fn seed(&self, kind: &str, resources: Vec<Resource>) {
        self.resources
            .write()
            .expect("in-memory provider poisoned")
            .insert(kind.to_string(), resources);
    }

    pub fn mark_ambiguous(&self, kind: &str) {
        self.ambiguous_kinds
            .write()
            .expect("in-memory provider poisoned")
            .push(kind.to_string());
    }
}

#[async_trait]
impl ResourceProvider for InMemoryProvider {
    async fn find_gvr(&self, kind: &str) -> Result<Gvr> {
        let lower = kind.to_lowercase();
        if let Some(unqualified) = lower.strip_prefix("core.") {
            return Ok(Gvr::new("", "v1", unqualified));
        }
        if self
            .ambiguous_kinds
            .read()
            .expect("in-memory provider poisoned")
            .iter()
            .any(|k| k == &lower)
        {
            return Err(EngineErrorKind::KindAmbiguous(
                lower,
                "ambiguous: try core.<kind> or apps.<kind>".to_string(),
            )
            .into());
        }
        Ok(Gvr::new("", "v1", lower))
    }

    async fn get_k8s_resources(
        &self,
        kind: &str,
        _field_selector: Option<&str>,
        _label_selector: Option<&str>,
        namespace: Option<&str>,
    ) -> Result<Vec<Resource>> {
        let all = self
            .resources
            .read()
            .expect("in-memory provider poisoned")
            .get(&kind.to_lowercase())
            .cloned()
            .unwrap_or_default();
        Ok(match namespace {
            Some(ns) => all.into_iter().filter(|r| r.namespace() == Some(ns)).collect(),
            None => all,
        })
    }

    async fn patch_k8s_resource(
        &self,
        kind: &str,
        name: &str,
        _namespace: Option<&str>,
        _patch_json: serde_json::Value,
    ) -> Result<()> {
        let exists = self
            .resources
            .read()
            .expect("in-memory provider poisoned")
            .get(&kind.to_lowercase())
            .map(|rs| rs.iter().any(|r| r.name() == Some(name)))
            .unwrap_or(false);
        if exists {
            Ok(())
        } else {
            Err(EngineErrorKind::ProviderPatch(format!("{kind}/{name} not found")).into())
        }
    }

    async fn create_k8s_resource(
        &self,
        kind: &str,
        _namespace: Option<&str>,
        body: serde_json::Value,
    ) -> Result<Resource> {
        let resource = Resource::new(body);
        self.resources
            .write()
            .expect("in-memory provider poisoned")
            .entry(kind.to_lowercase())
            .or_default()
            .push(resource.clone());
        Ok(resource)
    }

    async fn delete_k8s_resource(
        &self,
        kind: &str,
        name: &str,
        _namespace: Option<&str>,
    ) -> Result<()> {
        let mut guard = self.resources.write().expect("in-memory provider poisoned");
        let Some(list) = guard.get_mut(&kind.to_lowercase()) else {
            return Err(EngineErrorKind::ProviderDelete(format!("{kind}/{name} not found")).into());
        };
        let before = list.len();
        list.retain(|r| r.name() != Some(name));
        if list.len() == before {
            return Err(EngineErrorKind::ProviderDelete(format!("{kind}/{name} not found")).into());
        }
        Ok(())
    }

    async fn list_resource_kinds(&self) -> Result<Vec<String>> {
        Ok(self
            .resources
            .read()
            .expect("in-memory provider poisoned")
            .keys()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn seeded_resources_round_trip() {
        let provider = InMemoryProvider::new();
        provider.seed(
            "pods",
            vec![Resource::new(json!({"kind": "Pod", "metadata": {"name": "p1"}}))],
        );
        let rows = provider.get_k8s_resources("pods", None, None, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name(), Some("p1"));
    }

    #[tokio::test]
    async fn patch_unknown_resource_errors() {
        let provider = InMemoryProvider::new();
        let err = provider
            .patch_k8s_resource("pods", "ghost", None, json!([]))
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), EngineErrorKind::ProviderPatch(_)));
    }

    #[tokio::test]
    async fn ambiguous_kind_resolves_via_core_prefix() {
        let provider = InMemoryProvider::new();
        provider.mark_ambiguous("events");
        assert!(provider.find_gvr("events").await.is_err());
        let gvr = provider.find_gvr("core.events").await.unwrap();
        assert_eq!(gvr.resource, "events");
    }
}
