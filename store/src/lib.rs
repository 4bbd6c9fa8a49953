//! SQLite persistence for the review service.
//!
//! One `Store` handle wraps a single connection behind a mutex; the schema is
//! created idempotently at open. Callers get typed rows and typed enums, not
//! raw SQL. The in-memory constructor backs unit tests across the workspace.
//!
//! Vector columns hold little-endian f32 blobs (see [`vectors`]), which keeps
//! the descending-id paging used by retrieval a plain indexed scan.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::debug;

pub mod errors;
pub mod models;
pub mod vectors;

mod queries;
mod schema;

pub use errors::{StoreError, StoreResult};
pub use models::*;
pub use queries::analytics::RepoAnalytics;
pub use queries::feedback::CategorySignal;
pub use queries::graph::{NewGraphEdge, NewGraphNode};
pub use queries::index::{BundleEmbedding, BundleRef, BundleSymbol, FileBundle};
pub use queries::runs::RunJsonColumn;
pub use queries::tenancy::RepoUpsert;

/// Shared handle to the relational store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// In-memory store for tests.
    pub fn in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.lock();
        for stmt in schema::SCHEMA {
            conn.execute(stmt, [])?;
        }
        debug!("store: schema ready ({} statements)", schema::SCHEMA.len());
        Ok(())
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("store mutex poisoned")
    }

    pub(crate) fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }
}
