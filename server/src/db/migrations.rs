use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses SQLite user_version pragma for tracking; no migration table needed.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        "-- Migration 1: direct messages

CREATE TABLE messages (
    id TEXT PRIMARY KEY,
    sender_id TEXT NOT NULL,
    recipient_id TEXT NOT NULL,
    content TEXT NOT NULL,
    date_read TEXT,
    message_sent TEXT NOT NULL
);

CREATE INDEX idx_messages_pair ON messages(sender_id, recipient_id, message_sent);
CREATE INDEX idx_messages_unread ON messages(recipient_id, date_read);
",
    )])
}
