//! Typed query surface, grouped by entity family.

pub mod analytics;
pub mod comments;
pub mod feedback;
pub mod findings;
pub mod graph;
pub mod index;
pub mod pulls;
pub mod runs;
pub mod tenancy;

/// Wrap an enum round-trip failure so it can cross a `query_map` closure.
pub(crate) fn decode_err(
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
}
