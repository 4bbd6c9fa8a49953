//! Scheduler and worker errors.

use thiserror::Error;

pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("forge error: {0}")]
    Forge(#[from] forge_client::ForgeError),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("job failed: {0}")]
    Job(String),
}
