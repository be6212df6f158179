pub mod actor;
pub mod broadcast;
pub mod handler;
pub mod protocol;

use dashmap::DashMap;
use std::collections::HashSet;
use tokio::sync::mpsc;

/// Type alias for the sender half of a WebSocket connection's channel.
/// Other parts of the system can clone this to push messages to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

/// Which hub a connection was opened against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubKind {
    /// `/hubs/presence`: online/offline announcements.
    Presence,
    /// `/hubs/message?userId=...`: a direct-message conversation with `other_user_id`.
    Message { other_user_id: String },
}

/// One authenticated hub connection, as seen by the hub lifecycle handlers.
#[derive(Debug, Clone)]
pub struct HubConnection {
    pub connection_id: String,
    pub user_id: String,
    pub kind: HubKind,
    pub sender: ConnectionSender,
}

/// A connected client as tracked by a hub: its owner plus the channel to its writer task.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub user_id: String,
    pub sender: ConnectionSender,
}

/// Delivery index for one hub: connection id -> client, and named groups of connection ids.
///
/// Presence semantics live in `PresenceTracker`; this only answers "where do I send".
#[derive(Debug, Default)]
pub struct HubClients {
    connections: DashMap<String, ClientHandle>,
    groups: DashMap<String, HashSet<String>>,
}

impl HubClients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, connection_id: &str, user_id: &str, sender: ConnectionSender) {
        self.connections.insert(
            connection_id.to_string(),
            ClientHandle {
                user_id: user_id.to_string(),
                sender,
            },
        );
    }

    /// Drop a connection and remove it from every group it joined.
    pub fn remove(&self, connection_id: &str) {
        self.connections.remove(connection_id);
        self.groups.retain(|_, members| {
            members.remove(connection_id);
            !members.is_empty()
        });
    }

    pub fn add_to_group(&self, group: &str, connection_id: &str) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(connection_id.to_string());
    }

    pub fn remove_from_group(&self, group: &str, connection_id: &str) {
        let mut remove_group = false;

        if let Some(mut members) = self.groups.get_mut(group) {
            members.remove(connection_id);
            remove_group = members.is_empty();
        }

        if remove_group {
            self.groups.remove_if(group, |_, members| members.is_empty());
        }
    }

    /// Connection ids currently in `group`.
    pub fn group_members(&self, group: &str) -> Vec<String> {
        self.groups
            .get(group)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether any connection of `user_id` has joined `group`.
    pub fn group_has_user(&self, group: &str, user_id: &str) -> bool {
        self.group_members(group).iter().any(|connection_id| {
            self.connections
                .get(connection_id)
                .is_some_and(|client| client.user_id == user_id)
        })
    }

    /// Senders for the given connection ids, skipping ids that are no longer connected.
    pub(crate) fn senders_for<'a, I>(&self, connection_ids: I) -> Vec<ConnectionSender>
    where
        I: IntoIterator<Item = &'a String>,
    {
        connection_ids
            .into_iter()
            .filter_map(|id| self.connections.get(id).map(|c| c.sender.clone()))
            .collect()
    }

    /// Senders for every connection, optionally excluding one.
    pub(crate) fn all_senders_except(&self, excluded: Option<&str>) -> Vec<ConnectionSender> {
        self.connections
            .iter()
            .filter(|entry| Some(entry.key().as_str()) != excluded)
            .map(|entry| entry.value().sender.clone())
            .collect()
    }
}
