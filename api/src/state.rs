//! Shared receiver state.

use scheduler::{QueueSet, TriggerConfig};
use store::Store;

pub struct AppState {
    pub store: Store,
    pub queues: QueueSet,
    pub triggers: TriggerConfig,
    pub bot_login: String,
    /// Shared secret the sender must present in `X-Webhook-Secret`.
    pub webhook_secret: String,
}
