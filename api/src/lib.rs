//! HTTP receiver.
//!
//! Deliberately thin: verify the shared webhook secret, deserialize the
//! normalized event, hand it to the scheduler, and answer as soon as jobs
//! are enqueued. Nothing here waits on the pipeline.

pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tracing::info;

pub use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(routes::healthz))
        .route("/webhook", post(routes::webhook))
        .with_state(state)
}

/// Serve until the process is stopped.
pub async fn serve(state: Arc<AppState>, addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "api: listening");
    axum::serve(listener, router(state)).await
}
