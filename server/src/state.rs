use std::sync::Arc;

use crate::config::HubConfig;
use crate::db::DbPool;
use crate::presence::PresenceTracker;
use crate::ws::HubClients;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Online users and their presence connection ids
    pub presence: Arc<PresenceTracker>,
    /// Connections on /hubs/presence
    pub presence_hub: Arc<HubClients>,
    /// Connections on /hubs/message, grouped by conversation
    pub message_hub: Arc<HubClients>,
    /// Ping/pong settings for hub connections
    pub hub_config: HubConfig,
}

impl AppState {
    /// Fresh state with an empty presence registry and no connected clients.
    pub fn new(db: DbPool, jwt_secret: Vec<u8>, hub_config: HubConfig) -> Self {
        Self {
            db,
            jwt_secret,
            presence: Arc::new(PresenceTracker::new()),
            presence_hub: Arc::new(HubClients::new()),
            message_hub: Arc::new(HubClients::new()),
            hub_config,
        }
    }
}
