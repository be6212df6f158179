//! JSON hub protocol.
//!
//! Every WebSocket text message carries exactly one [`Frame`]:
//!
//! ```text
//! {"type":"invocation","target":"UserOnline","arguments":["u1"]}
//! {"type":"invocation","invocationId":"7","target":"SendMessage","arguments":[{...}]}
//! {"type":"completion","invocationId":"7","error":"You cannot message yourself"}
//! ```

use axum::extract::ws::Message;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HubError;
use crate::messages;
use crate::state::AppState;
use crate::ws::broadcast::send_to_sender;
use crate::ws::{HubConnection, HubKind};

// Server -> client event targets.
pub const USER_ONLINE: &str = "UserOnline";
pub const USER_OFFLINE: &str = "UserOffline";
pub const GET_ONLINE_USERS: &str = "GetOnlineUsers";
pub const RECEIVE_MESSAGE_THREAD: &str = "ReceiveMessageThread";
pub const NEW_MESSAGE: &str = "NewMessage";
pub const NEW_MESSAGE_NOTIFICATION: &str = "NewMessageNotification";

// Client -> server methods.
pub const SEND_MESSAGE: &str = "SendMessage";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Frame {
    Invocation {
        #[serde(
            rename = "invocationId",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        invocation_id: Option<String>,
        target: String,
        #[serde(default)]
        arguments: Vec<Value>,
    },
    Completion {
        #[serde(rename = "invocationId")]
        invocation_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl Frame {
    /// A server-pushed event with a single argument.
    /// Returns `None` (and logs) if the argument cannot be encoded.
    pub fn event<T: Serialize>(target: &str, argument: &T) -> Option<Self> {
        match serde_json::to_value(argument) {
            Ok(argument) => Some(Frame::Invocation {
                invocation_id: None,
                target: target.to_string(),
                arguments: vec![argument],
            }),
            Err(e) => {
                tracing::warn!(event = %target, error = %e, "Failed to encode event argument");
                None
            }
        }
    }

    /// The result of a client invocation.
    pub fn completion(invocation_id: &str, result: &Result<(), HubError>) -> Self {
        Frame::Completion {
            invocation_id: invocation_id.to_string(),
            error: result.as_ref().err().map(|e| e.to_string()),
        }
    }

    pub fn to_message(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(json) => Some(Message::Text(json.into())),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode hub frame");
                None
            }
        }
    }
}

/// Decode the first invocation argument as `T`.
fn first_argument<T: DeserializeOwned>(target: &str, arguments: Vec<Value>) -> Result<T, HubError> {
    let argument = arguments
        .into_iter()
        .next()
        .ok_or_else(|| HubError::InvalidArguments(target.to_string()))?;
    serde_json::from_value(argument).map_err(|_| HubError::InvalidArguments(target.to_string()))
}

/// Handle an incoming text (JSON) message.
/// Decodes the frame, dispatches invocations, and answers with a completion.
pub async fn handle_text_message(text: &str, state: &AppState, connection: &HubConnection) {
    let frame = match serde_json::from_str::<Frame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(
                user_id = %connection.user_id,
                connection_id = %connection.connection_id,
                error = %e,
                "Failed to decode hub frame"
            );
            send_to_sender(
                &connection.sender,
                &Frame::completion("", &Err(HubError::MalformedFrame)),
            );
            return;
        }
    };

    match frame {
        Frame::Invocation {
            invocation_id,
            target,
            arguments,
        } => {
            let result = dispatch_invocation(&target, arguments, state, connection).await;

            if let Err(e) = &result {
                tracing::debug!(
                    user_id = %connection.user_id,
                    method = %target,
                    error = %e,
                    "Hub invocation failed"
                );
            }

            // Fire-and-forget invocations only hear back when something went wrong.
            match invocation_id {
                Some(id) => send_to_sender(&connection.sender, &Frame::completion(&id, &result)),
                None if result.is_err() => {
                    send_to_sender(&connection.sender, &Frame::completion("", &result))
                }
                None => {}
            }
        }
        Frame::Completion { .. } => {
            tracing::debug!(
                user_id = %connection.user_id,
                "Ignoring completion frame sent by client"
            );
        }
    }
}

/// Dispatch an invocation to the hub method it names.
async fn dispatch_invocation(
    target: &str,
    arguments: Vec<Value>,
    state: &AppState,
    connection: &HubConnection,
) -> Result<(), HubError> {
    match (&connection.kind, target) {
        (HubKind::Message { .. }, SEND_MESSAGE) => {
            let request = first_argument(target, arguments)?;
            messages::hub::send_message(state, connection, request).await
        }
        _ => Err(HubError::UnknownMethod(target.to_string())),
    }
}
