use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, timeout};

use crate::messages;
use crate::presence;
use crate::state::AppState;
use crate::ws::broadcast::close_connection;
use crate::ws::{protocol, HubClients, HubConnection, HubKind};

/// Close code sent when a client stops answering pings.
const CLOSE_GOING_AWAY: u16 = 1001;

/// How long the writer gets to flush the close frame after a pong timeout.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

fn clients<'a>(state: &'a AppState, kind: &HubKind) -> &'a HubClients {
    match kind {
        HubKind::Presence => state.presence_hub.as_ref(),
        HubKind::Message { .. } => state.message_hub.as_ref(),
    }
}

/// Run the actor-per-connection pattern for an authenticated hub socket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Ping task: pings periodically and closes the socket when pongs stop
/// - Reader loop: decodes incoming frames and dispatches hub invocations
///
/// The connection is registered with its hub before the connect handler runs
/// and removed before the disconnect handler runs, so neither handler's
/// broadcasts reach a socket that is not live.
pub async fn run_connection(socket: WebSocket, state: AppState, user_id: String, kind: HubKind) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    let connection = HubConnection {
        connection_id: uuid::Uuid::now_v7().to_string(),
        user_id,
        kind,
        sender: tx.clone(),
    };

    clients(&state, &connection.kind).add(
        &connection.connection_id,
        &connection.user_id,
        tx.clone(),
    );

    // Spawn writer task before the connect handler queues its first frames
    let mut writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    match &connection.kind {
        HubKind::Presence => presence::on_connected(&state, &connection),
        HubKind::Message { .. } => messages::hub::on_connected(&state, &connection).await,
    }

    tracing::info!(
        user_id = %connection.user_id,
        connection_id = %connection.connection_id,
        hub = ?connection.kind,
        "Hub actor started"
    );

    // Holds at most one "pong seen" mark, so a burst of pongs cannot pay for later pings
    let (pong_tx, mut pong_rx) = watch::channel(());

    let ping_tx = tx.clone();
    let ping_interval = state.hub_config.ping_interval();
    let pong_timeout = state.hub_config.pong_timeout();
    let mut ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(ping_interval);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            // Forget pongs that arrived before this ping
            pong_rx.borrow_and_update();

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died, connection is gone
                break;
            }

            match timeout(pong_timeout, pong_rx.changed()).await {
                Ok(Ok(())) => {}
                _ => {
                    tracing::warn!("Pong timeout, closing connection");
                    close_connection(&ping_tx, CLOSE_GOING_AWAY, "Pong timeout");
                    break;
                }
            }
        }
    });

    let mut keepalive_expired = false;

    loop {
        let next = tokio::select! {
            next = ws_receiver.next() => next,
            // Keepalive gave up; a dead peer will never send its close frame
            _ = &mut ping_handle => {
                tracing::info!(user_id = %connection.user_id, "Keepalive ended, dropping connection");
                keepalive_expired = true;
                break;
            }
        };

        match next {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    protocol::handle_text_message(text.as_str(), &state, &connection).await;
                }
                Message::Binary(_) => {
                    tracing::debug!(
                        user_id = %connection.user_id,
                        "Received binary message (expected JSON text), ignoring"
                    );
                }
                Message::Pong(_) => {
                    pong_tx.send_replace(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        user_id = %connection.user_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    user_id = %connection.user_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                tracing::info!(user_id = %connection.user_id, "WebSocket stream ended");
                break;
            }
        }
    }

    if keepalive_expired {
        // The 1001 close frame is already queued; let the writer send it
        let _ = timeout(CLOSE_FLUSH_TIMEOUT, &mut writer_handle).await;
    }

    writer_handle.abort();
    ping_handle.abort();

    clients(&state, &connection.kind).remove(&connection.connection_id);

    match &connection.kind {
        HubKind::Presence => presence::on_disconnected(&state, &connection),
        HubKind::Message { .. } => messages::hub::on_disconnected(&state, &connection),
    }

    tracing::info!(
        user_id = %connection.user_id,
        connection_id = %connection.connection_id,
        "Hub actor stopped"
    );
}

/// Writer task: receives messages from mpsc channel and forwards them to the WebSocket sink.
/// Stops after forwarding a close frame.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let is_close = matches!(msg, Message::Close(_));
        if ws_sender.send(msg).await.is_err() || is_close {
            break;
        }
    }
}
