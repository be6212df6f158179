//! Message hub lifecycle: conversation groups, thread delivery and `SendMessage`.

use chrono::Utc;

use crate::error::{HubError, StoreError};
use crate::messages::{group_name, store, CreateMessageDto, MessageDto};
use crate::state::AppState;
use crate::ws::broadcast::{send_to_connections, send_to_group, send_to_sender};
use crate::ws::protocol::{Frame, NEW_MESSAGE, NEW_MESSAGE_NOTIFICATION, RECEIVE_MESSAGE_THREAD};
use crate::ws::{HubConnection, HubKind};

fn other_user(connection: &HubConnection) -> Option<&str> {
    match &connection.kind {
        HubKind::Message { other_user_id } => Some(other_user_id.as_str()),
        HubKind::Presence => None,
    }
}

/// Join the conversation group and push the thread to the caller.
pub async fn on_connected(state: &AppState, connection: &HubConnection) {
    let Some(other_user_id) = other_user(connection) else {
        return;
    };

    let group = group_name(&connection.user_id, other_user_id);
    state
        .message_hub
        .add_to_group(&group, &connection.connection_id);

    let db = state.db.clone();
    let user_id = connection.user_id.clone();
    let other = other_user_id.to_string();
    let thread = tokio::task::spawn_blocking(move || {
        store::load_thread(&db, &user_id, &other, Utc::now())
    })
    .await
    .map_err(StoreError::from)
    .and_then(|result| result);

    match thread {
        Ok(messages) => {
            tracing::debug!(
                user_id = %connection.user_id,
                group = %group,
                messages = messages.len(),
                "Sending message thread"
            );
            if let Some(frame) = Frame::event(RECEIVE_MESSAGE_THREAD, &messages) {
                send_to_sender(&connection.sender, &frame);
            }
        }
        Err(e) => {
            tracing::warn!(
                user_id = %connection.user_id,
                group = %group,
                error = %e,
                "Failed to load message thread"
            );
        }
    }
}

/// Leave the conversation group.
pub fn on_disconnected(state: &AppState, connection: &HubConnection) {
    if let Some(other_user_id) = other_user(connection) {
        let group = group_name(&connection.user_id, other_user_id);
        state
            .message_hub
            .remove_from_group(&group, &connection.connection_id);
    }
}

/// `SendMessage`: persist a message and deliver it to the conversation.
///
/// A recipient watching the conversation gets the message already marked
/// read; a recipient who is online elsewhere gets a notification on every
/// presence connection instead.
pub async fn send_message(
    state: &AppState,
    connection: &HubConnection,
    request: CreateMessageDto,
) -> Result<(), HubError> {
    let sender_id = connection.user_id.clone();

    if sender_id == request.recipient_id {
        return Err(HubError::SelfMessage);
    }
    if request.content.trim().is_empty() {
        return Err(HubError::EmptyContent);
    }

    let group = group_name(&sender_id, &request.recipient_id);
    let now = Utc::now();

    let mut message = MessageDto {
        id: uuid::Uuid::now_v7().to_string(),
        sender_id,
        recipient_id: request.recipient_id,
        content: request.content,
        date_read: None,
        message_sent: now,
    };

    let recipient_in_group = state
        .message_hub
        .group_has_user(&group, &message.recipient_id);
    if recipient_in_group {
        message.date_read = Some(now);
    }

    let db = state.db.clone();
    let to_store = message.clone();
    tokio::task::spawn_blocking(move || store::insert_message(&db, &to_store))
        .await
        .map_err(StoreError::from)??;

    if !recipient_in_group {
        let connections = state.presence.connections_for_user(&message.recipient_id);
        if !connections.is_empty() {
            if let Some(frame) = Frame::event(NEW_MESSAGE_NOTIFICATION, &message) {
                send_to_connections(&state.presence_hub, &connections, &frame);
            }
        }
    }

    tracing::debug!(
        message_id = %message.id,
        sender_id = %message.sender_id,
        recipient_id = %message.recipient_id,
        read = message.date_read.is_some(),
        "Message sent"
    );

    if let Some(frame) = Frame::event(NEW_MESSAGE, &message) {
        send_to_group(&state.message_hub, &group, &frame);
    }

    Ok(())
}
