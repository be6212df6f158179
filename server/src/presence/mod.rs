//! Presence hub.
//!
//! Connection lifecycle for `/hubs/presence` on top of the in-memory
//! [`PresenceTracker`], plus the REST query for the current online list.
//! Online/offline events are only broadcast on actual transitions, so a user
//! opening a second tab does not re-announce themselves.

pub mod tracker;

pub use tracker::PresenceTracker;

use axum::{extract::State, Json};

use crate::auth::middleware::Claims;
use crate::state::AppState;
use crate::ws::broadcast::{broadcast_to_all, broadcast_to_others, send_to_sender};
use crate::ws::protocol::{Frame, GET_ONLINE_USERS, USER_OFFLINE, USER_ONLINE};
use crate::ws::HubConnection;

// --- Functions called from WS actor lifecycle ---

/// Register the connection and announce the user if they just came online.
/// The caller always receives the current online list.
pub fn on_connected(state: &AppState, connection: &HubConnection) {
    let came_online = state
        .presence
        .register_connection(&connection.user_id, &connection.connection_id);

    let online_users = Frame::event(GET_ONLINE_USERS, &state.presence.online_users());

    if came_online {
        tracing::info!(user_id = %connection.user_id, "User online");
        if let Some(frame) = Frame::event(USER_ONLINE, &connection.user_id) {
            broadcast_to_others(&state.presence_hub, &connection.connection_id, &frame);
        }
        if let Some(frame) = &online_users {
            broadcast_to_all(&state.presence_hub, frame);
        }
    } else if let Some(frame) = &online_users {
        send_to_sender(&connection.sender, frame);
    }
}

/// Unregister the connection and announce the user if it was their last one.
///
/// Must run after the connection has left `presence_hub`, so the departing
/// socket is not among the recipients.
pub fn on_disconnected(state: &AppState, connection: &HubConnection) {
    let went_offline = state
        .presence
        .unregister_connection(&connection.user_id, &connection.connection_id);

    if went_offline {
        tracing::info!(user_id = %connection.user_id, "User offline");
        if let Some(frame) = Frame::event(USER_OFFLINE, &connection.user_id) {
            broadcast_to_all(&state.presence_hub, &frame);
        }
        if let Some(frame) = Frame::event(GET_ONLINE_USERS, &state.presence.online_users()) {
            broadcast_to_all(&state.presence_hub, &frame);
        }
    }
}

// --- REST endpoint handlers ---

/// GET /api/presence: returns the ids of online users, ascending. JWT auth required.
pub async fn get_online_users(
    State(state): State<AppState>,
    _claims: Claims,
) -> Json<Vec<String>> {
    Json(state.presence.online_users())
}
