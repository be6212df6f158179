//! SQLite persistence for direct messages.
//!
//! Functions here are synchronous; async callers go through `spawn_blocking`.

use chrono::{DateTime, Utc};
use rusqlite::Row;

use crate::db::DbPool;
use crate::error::StoreError;
use crate::messages::MessageDto;

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<MessageDto> {
    Ok(MessageDto {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        recipient_id: row.get(2)?,
        content: row.get(3)?,
        date_read: row.get::<_, Option<DateTime<Utc>>>(4)?,
        message_sent: row.get(5)?,
    })
}

/// Persist a new message.
pub fn insert_message(db: &DbPool, message: &MessageDto) -> Result<(), StoreError> {
    let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;

    conn.execute(
        "INSERT INTO messages (id, sender_id, recipient_id, content, date_read, message_sent)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            message.id,
            message.sender_id,
            message.recipient_id,
            message.content,
            message.date_read,
            message.message_sent,
        ],
    )?;

    Ok(())
}

/// Load the conversation between `current_user` and `other_user`, oldest first.
///
/// Unread messages addressed to `current_user` are marked read at `now`
/// before loading, so the returned thread reflects the update.
pub fn load_thread(
    db: &DbPool,
    current_user: &str,
    other_user: &str,
    now: DateTime<Utc>,
) -> Result<Vec<MessageDto>, StoreError> {
    let mut conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
    let tx = conn.transaction()?;

    let marked = tx.execute(
        "UPDATE messages SET date_read = ?1
         WHERE recipient_id = ?2 AND sender_id = ?3 AND date_read IS NULL",
        rusqlite::params![now, current_user, other_user],
    )?;

    let messages = {
        let mut stmt = tx.prepare(
            "SELECT id, sender_id, recipient_id, content, date_read, message_sent
             FROM messages
             WHERE (sender_id = ?1 AND recipient_id = ?2)
                OR (sender_id = ?2 AND recipient_id = ?1)
             ORDER BY message_sent ASC, id ASC",
        )?;
        let rows = stmt.query_map(rusqlite::params![current_user, other_user], row_to_message)?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    tx.commit()?;

    if marked > 0 {
        tracing::debug!(
            user_id = %current_user,
            other_user_id = %other_user,
            marked,
            "Marked thread messages as read"
        );
    }

    Ok(messages)
}
