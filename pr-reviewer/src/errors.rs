//! Pipeline error hierarchy.
//!
//! Single root error for the public entry; `From` impls keep `?` ergonomic
//! across the collaborator crates.

use thiserror::Error;

pub type ReviewResult<T> = Result<T, ReviewError>;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("store error: {0}")]
    Store(#[from] store::StoreError),

    /// Fatal forge failure. Integration-permission 403s on write operations
    /// never reach this variant: the posting layer intercepts
    /// `ForgeError::PermissionDenied` and downgrades it to a run warning.
    #[error("forge error: {0}")]
    Forge(#[from] forge_client::ForgeError),

    #[error("checkout error: {0}")]
    Checkout(#[from] repo_store::RepoStoreError),

    #[error("stage error: {0}")]
    Stage(#[from] stage_runner::StageError),

    #[error("context error: {0}")]
    Context(#[from] contextor::ContextorError),

    #[error("reconcile error: {0}")]
    Reconcile(#[from] reconciler::ReconcileError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("run was superseded by a newer completed run")]
    Superseded,

    #[error("{0}")]
    Invalid(String),
}
