//! Context-pack builder error type.

use thiserror::Error;

pub type ContextorResult<T> = Result<T, ContextorError>;

#[derive(Debug, Error)]
pub enum ContextorError {
    #[error("store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("graph error: {0}")]
    Graph(#[from] code_graph::GraphError),

    #[error("embedding error: {0}")]
    Embedding(#[from] code_indexer::errors::IndexerError),
}
