//! Stage execution and validation errors.

use thiserror::Error;

pub type StageResult<T> = Result<T, StageError>;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("stage {stage} timed out after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },

    #[error("stage {stage} exited with {status}: {stderr}")]
    Process {
        stage: &'static str,
        status: String,
        stderr: String,
    },

    #[error("stage {stage} produced no {file}")]
    MissingOutput { stage: &'static str, file: String },

    #[error("stage {stage} output failed validation: {source}")]
    Validation {
        stage: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
