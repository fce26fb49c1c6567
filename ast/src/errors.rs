use thiserror::Error;

/// Structural errors raised while validating a parsed `Expression`, before it
/// ever reaches the kind resolver or executor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AstError {
    #[error("kindless node `{0}` does not participate in any relationship")]
    KindlessStandalone(String),
    #[error("kindless nodes `{0}` and `{1}` cannot be directly related; at least one side must be kinded")]
    KindlessChain(String, String),
    #[error("relationship references unknown node `{0}`")]
    UnknownNode(String),
}
