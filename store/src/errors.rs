//! Error type for the persistence layer.

use thiserror::Error;

/// Convenient alias for store-wide results.
pub type StoreResult<T> = Result<T, StoreError>;

/// Root error type for the store crate.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON column (de)serialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A row was expected but not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A stored enum tag did not round-trip.
    #[error("invalid stored value: {0}")]
    InvalidValue(String),
}
