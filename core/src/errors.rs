use thiserror::Error;

#[derive(Error, Debug)]
#[error(transparent)]
pub struct EngineError(Box<EngineErrorKind>);

impl EngineError {
    pub fn kind(&self) -> &EngineErrorKind {
        &self.0
    }

    pub fn from_kind(kind: EngineErrorKind) -> Self {
        EngineError(Box::new(kind))
    }
}

#[derive(Error, Debug)]
pub enum EngineErrorKind {
    #[error("unable to resolve kind `{0}`")]
    KindUnresolved(String),
    #[error("kind `{0}` is ambiguous: {1}")]
    KindAmbiguous(String, String),
    #[error("kindless node `{0}` does not participate in any relationship")]
    KindlessStandalone(String),
    #[error("kindless nodes `{0}` and `{1}` cannot be directly related")]
    KindlessChain(String, String),
    #[error("unable to determine kind for nodes in relationship")]
    KindIntersectionEmpty,
    #[error("fetching resources failed: {0}")]
    ProviderFetch(String),
    #[error("patching resource failed: {0}")]
    ProviderPatch(String),
    #[error("creating resource failed: {0}")]
    ProviderCreate(String),
    #[error("deleting resource failed: {0}")]
    ProviderDelete(String),
    #[error("invalid path `{0}`")]
    PathInvalid(String),
    #[error("invalid ISO-8601 duration `{0}`")]
    DurationInvalid(String),
    #[error("unsupported operator for this comparison")]
    OperatorUnsupported,
    #[error("unsupported comparison type `{0}`")]
    ComparisonUnsupported(String),
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
    #[error("SerdeJsonError: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error("SerdeYamlError: {0}")]
    SerdeYamlError(#[from] serde_yaml::Error),
    #[error("IoError: {0}")]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    AstError(#[from] qgraph_ast::AstError),
}

impl<E> From<E> for EngineError
where
    EngineErrorKind: From<E>,
{
    fn from(err: E) -> Self {
        EngineError(Box::new(EngineErrorKind::from(err)))
    }
}
