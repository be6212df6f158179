//! Direct messages between two members: persistence and the message hub.

pub mod hub;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A direct message as sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
    pub date_read: Option<DateTime<Utc>>,
    pub message_sent: DateTime<Utc>,
}

/// Argument of the `SendMessage` hub method.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageDto {
    pub recipient_id: String,
    pub content: String,
}

/// Group shared by both participants of a conversation, independent of who connected first.
///
/// User ids may contain any character, so the first id is length-prefixed:
/// `("a", "b-c")` and `("a-b", "c")` must never share a group.
pub fn group_name(caller: &str, other: &str) -> String {
    let (first, second) = if caller < other {
        (caller, other)
    } else {
        (other, caller)
    };
    format!("{}:{}-{}", first.len(), first, second)
}
