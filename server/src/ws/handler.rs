use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::Deserialize;

use crate::auth::jwt;
use crate::state::AppState;
use crate::ws::{actor, HubKind};

/// Query parameters for hub connections.
/// Browsers cannot set headers on a WebSocket handshake, so the token rides in
/// `access_token`; the message hub also names the other participant in `userId`.
#[derive(Debug, Deserialize)]
pub struct HubQuery {
    pub access_token: String,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// WebSocket close codes:
/// 4000 = bad request (missing userId on the message hub)
/// 4001 = token expired
/// 4002 = token invalid
pub const CLOSE_BAD_REQUEST: u16 = 4000;
pub const CLOSE_TOKEN_EXPIRED: u16 = 4001;
pub const CLOSE_TOKEN_INVALID: u16 = 4002;

/// GET /hubs/presence?access_token=JWT
pub async fn presence_hub(
    State(state): State<AppState>,
    Query(params): Query<HubQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    upgrade(state, params.access_token, HubKind::Presence, ws)
}

/// GET /hubs/message?access_token=JWT&userId=OTHER
pub async fn message_hub(
    State(state): State<AppState>,
    Query(params): Query<HubQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    match params.user_id.filter(|id| !id.is_empty()) {
        Some(other_user_id) => upgrade(
            state,
            params.access_token,
            HubKind::Message { other_user_id },
            ws,
        ),
        None => {
            tracing::warn!("Message hub connection without userId");
            reject(ws, CLOSE_BAD_REQUEST, "Missing userId")
        }
    }
}

/// Authenticate the handshake token, then hand the socket to an actor.
/// On auth failure, upgrades then immediately closes with the appropriate close code.
fn upgrade(state: AppState, token: String, kind: HubKind, ws: WebSocketUpgrade) -> Response {
    match jwt::validate_access_token(&state.jwt_secret, &token) {
        Ok(claims) => {
            tracing::info!(
                user_id = %claims.sub,
                hub = ?kind,
                "Hub connection authenticated"
            );
            ws.on_upgrade(move |socket| handle_authenticated(socket, state, claims.sub, kind))
        }
        Err(err) => {
            let (close_code, reason) = match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    (CLOSE_TOKEN_EXPIRED, "Token expired")
                }
                _ => (CLOSE_TOKEN_INVALID, "Token invalid"),
            };

            tracing::warn!(
                close_code = close_code,
                reason = reason,
                "Hub auth failed"
            );

            reject(ws, close_code, reason)
        }
    }
}

/// Upgrade the connection, then immediately close it with `close_code`.
fn reject(ws: WebSocketUpgrade, close_code: u16, reason: &'static str) -> Response {
    ws.on_upgrade(move |mut socket| async move {
        let close_frame = CloseFrame {
            code: close_code,
            reason: reason.into(),
        };
        let _ = socket.send(Message::Close(Some(close_frame))).await;
    })
}

async fn handle_authenticated(socket: WebSocket, state: AppState, user_id: String, kind: HubKind) {
    actor::run_connection(socket, state, user_id, kind).await;
}
