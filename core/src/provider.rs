use async_trait::async_trait;
use qgraph_ast::Resource;

use crate::prelude::*;

/// A resolved group-version-resource triple, as returned by
/// [`ResourceProvider::find_gvr`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Gvr {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl Gvr {
    pub fn new(group: impl Into<String>, version: impl Into<String>, resource: impl Into<String>) -> Self {
        Gvr {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }

    /// The canonical cache key used by the kind resolver: `"<resource>.<group>"`,
    /// or `"<resource>.core"` when the group is empty.
    pub fn cache_key(&self) -> String {
        if self.group.is_empty() {
            format!("{}.core", self.resource)
        } else {
            format!("{}.{}", self.resource, self.group)
        }
    }
}

/// The sole external contract the engine depends on. A real binary backs this
/// with a cluster client; the crate's own test suite backs it with the
/// in-memory double in [`crate::testkit`].
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    async fn find_gvr(&self, kind: &str) -> Result<Gvr>;

    async fn get_k8s_resources(
        &self,
        kind: &str,
        field_selector: Option<&str>,
        label_selector: Option<&str>,
        namespace: Option<&str>,
    ) -> Result<Vec<Resource>>;

    async fn patch_k8s_resource(
        &self,
        kind: &str,
        name: &str,
        namespace: Option<&str>,
        patch_json: serde_json::Value,
    ) -> Result<()>;

    async fn create_k8s_resource(
        &self,
        kind: &str,
        namespace: Option<&str>,
        body: serde_json::Value,
    ) -> Result<Resource>;

    async fn delete_k8s_resource(
        &self,
        kind: &str,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<()>;

    async fn list_resource_kinds(&self) -> Result<Vec<String>>;
}
