use rusqlite::{params, Connection};
use std::sync::{Mutex, MutexGuard};

use crate::models::{Message, MAX_CONTENT_LEN};
use crate::repo::StorageError;

pub struct MessageRepository<'a> {
    conn: &'a Mutex<Connection>,
}

impl<'a> MessageRepository<'a> {
    pub fn new(conn: &'a Mutex<Connection>) -> Self {
        MessageRepository { conn }
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Validates ids, trims and bounds `content`, and persists. Returns the
    /// new message id.
    pub fn save_message(
        &self,
        room_id: i64,
        sender_id: i64,
        content: &str,
        sent_at: &str,
    ) -> Result<i64, StorageError> {
        if room_id <= 0 || sender_id <= 0 {
            return Err(StorageError::Invalid("room_id and sender_id must be positive"));
        }
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(StorageError::Invalid("content must not be blank"));
        }
        if trimmed.chars().count() > MAX_CONTENT_LEN {
            return Err(StorageError::Invalid("content exceeds maximum length"));
        }
        if sent_at.is_empty() {
            return Err(StorageError::Invalid("sent_at must not be blank"));
        }

        let conn = self.lock();
        conn.execute(
            "INSERT INTO message (chat_room_id, sender_id, content, sent_at) VALUES (?1, ?2, ?3, ?4)",
            params![room_id, sender_id, trimmed, sent_at],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// The most recent `max(1, limit)` rows, returned in ascending `sent_at`
    /// order. Selects newest-first so a room with more history than `limit`
    /// yields the latest messages rather than the oldest, then reverses to
    /// chronological order before returning. Each result carries the
    /// sender's username alongside the message fields.
    pub fn load_history(&self, room_id: i64, limit: i64) -> Result<Vec<Message>, StorageError> {
        let limit = limit.max(1);
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT m.id, m.chat_room_id, m.sender_id, u.username, m.content, m.sent_at
             FROM message m JOIN users u ON u.id = m.sender_id
             WHERE m.chat_room_id = ?1
             ORDER BY m.sent_at DESC, m.id DESC
             LIMIT ?2",
        )?;
        let mut rows = stmt
            .query_map(params![room_id, limit], |row| {
                Ok(Message {
                    id: row.get(0)?,
                    chat_room_id: row.get(1)?,
                    sender_id: row.get(2)?,
                    sender_username: row.get(3)?,
                    content: row.get(4)?,
                    sent_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.reverse();
        Ok(rows)
    }
}
