use axum::extract::ws::Message;

use super::protocol::Frame;
use super::{ConnectionSender, HubClients};

fn deliver(senders: &[ConnectionSender], frame: &Frame) {
    let Some(msg) = frame.to_message() else {
        return;
    };
    for sender in senders {
        let _ = sender.send(msg.clone());
    }
}

/// Send a frame directly to a single connection's channel.
pub fn send_to_sender(sender: &ConnectionSender, frame: &Frame) {
    if let Some(msg) = frame.to_message() {
        let _ = sender.send(msg);
    }
}

/// Broadcast a frame to every connection of the hub.
pub fn broadcast_to_all(clients: &HubClients, frame: &Frame) {
    deliver(&clients.all_senders_except(None), frame);
}

/// Broadcast a frame to every connection except `connection_id` (the caller).
pub fn broadcast_to_others(clients: &HubClients, connection_id: &str, frame: &Frame) {
    deliver(&clients.all_senders_except(Some(connection_id)), frame);
}

/// Send a frame to an explicit set of connections, e.g. every tab of one user.
pub fn send_to_connections<'a, I>(clients: &HubClients, connection_ids: I, frame: &Frame)
where
    I: IntoIterator<Item = &'a String>,
{
    deliver(&clients.senders_for(connection_ids), frame);
}

/// Send a frame to every connection that joined `group`.
pub fn send_to_group(clients: &HubClients, group: &str, frame: &Frame) {
    let members = clients.group_members(group);
    deliver(&clients.senders_for(&members), frame);
}

/// Ask a connection's writer to close the socket with the given code.
pub fn close_connection(sender: &ConnectionSender, close_code: u16, reason: &str) {
    let close_frame = axum::extract::ws::CloseFrame {
        code: close_code,
        reason: reason.into(),
    };
    let _ = sender.send(Message::Close(Some(close_frame)));
}
