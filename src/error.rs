use thiserror::Error;

/// Error taxonomy for resolution and deployment.
///
/// Only pre-flight errors surface through this type: anything that goes wrong
/// while processing a single target is captured in that target's history row
/// and counted, never escalated to abort the batch.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Request rejected before any work started
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced record does not exist in the caller's organization
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Target expansion produced an empty list
    #[error("no deployment targets after expansion")]
    NoTargets,

    /// The deployment record itself could not be created
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl DeployError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        DeployError::NotFound {
            kind,
            id: id.into(),
        }
    }
}
