use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An opaque nested resource document. Always carries `kind` and
/// `metadata.name`; `metadata.namespace`/`metadata.labels` are optional.
/// Wrapped rather than passed around as a bare `serde_json::Value` so the
/// handful of fields every component cares about have one accessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource(pub Value);

impl Resource {
    pub fn new(value: Value) -> Self {
        Resource(value)
    }

    pub fn kind(&self) -> Option<&str> {
        self.0.get("kind")?.as_str()
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("metadata")?.get("name")?.as_str()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.0.get("metadata")?.get("namespace")?.as_str()
    }

    pub fn labels(&self) -> Option<&serde_json::Map<String, Value>> {
        self.0.get("metadata")?.get("labels")?.as_object()
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn as_value_mut(&mut self) -> &mut Value {
        &mut self.0
    }
}

impl From<Value> for Resource {
    fn from(value: Value) -> Self {
        Resource(value)
    }
}
