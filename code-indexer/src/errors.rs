//! Indexer error type.

use thiserror::Error;

pub type IndexerResult<T> = Result<T, IndexerError>;

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("embedding provider error: {0}")]
    Embedding(String),

    #[error("parser error: {0}")]
    Parser(String),
}

impl From<reqwest::Error> for IndexerError {
    fn from(e: reqwest::Error) -> Self {
        IndexerError::Embedding(e.to_string())
    }
}
