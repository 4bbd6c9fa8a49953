//! Receiver routes.

use std::sync::Arc;

use axum::extract::{Json, State};
use axum::http::{HeaderMap, StatusCode};
use serde_json::json;
use tracing::{info, instrument, warn};

use scheduler::{WebhookEvent, WebhookHandler};

use crate::state::AppState;

pub async fn healthz() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// Webhook intake. The payload is the pre-normalized event shape; signature
/// verification is a shared-secret header on this seam.
#[instrument(name = "webhook_route", skip(state, headers, event))]
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(event): Json<WebhookEvent>,
) -> (StatusCode, Json<serde_json::Value>) {
    let presented = headers
        .get("X-Webhook-Secret")
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();
    if state.webhook_secret.is_empty() || presented != state.webhook_secret {
        warn!("webhook: secret mismatch");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid webhook secret" })),
        );
    }

    let handler = WebhookHandler {
        store: &state.store,
        queues: &state.queues,
        triggers: &state.triggers,
        bot_login: &state.bot_login,
        forge: None,
    };

    match handler.handle(&event).await {
        Ok(decision) => {
            info!(?decision, "webhook: handled");
            (
                StatusCode::ACCEPTED,
                Json(json!({ "decision": format!("{decision:?}") })),
            )
        }
        Err(e) => {
            warn!("webhook: failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}
