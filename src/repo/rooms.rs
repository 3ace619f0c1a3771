use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Mutex, MutexGuard};

use crate::repo::{is_unique_violation, StorageError};

pub struct ChatRoomRepository<'a> {
    conn: &'a Mutex<Connection>,
}

impl<'a> ChatRoomRepository<'a> {
    pub fn new(conn: &'a Mutex<Connection>) -> Self {
        ChatRoomRepository { conn }
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Scoped to `room_type = 'ROOM'`.
    pub fn find_room_id_by_name(&self, name: &str) -> Result<Option<i64>, StorageError> {
        let conn = self.lock();
        conn.query_row(
            "SELECT id FROM chat_room WHERE name = ?1 AND room_type = 'ROOM'",
            params![name],
            |row| row.get(0),
        )
        .optional()
        .map_err(StorageError::from)
    }

    /// Idempotent: if a public room with that name already exists, returns
    /// its id; on a unique-constraint race, re-reads and returns the
    /// existing id instead of propagating the error.
    pub fn create_room(&self, name: &str) -> Result<i64, StorageError> {
        if let Some(id) = self.find_room_id_by_name(name)? {
            return Ok(id);
        }

        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.lock();
        match conn.execute(
            "INSERT INTO chat_room (name, room_type, created_at) VALUES (?1, 'ROOM', ?2)",
            params![name, now],
        ) {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(e) if is_unique_violation(&e) => conn
                .query_row(
                    "SELECT id FROM chat_room WHERE name = ?1 AND room_type = 'ROOM'",
                    params![name],
                    |row| row.get(0),
                )
                .map_err(StorageError::from),
            Err(e) => Err(StorageError::from(e)),
        }
    }

    /// Creates a `DM` room with an opaque, non-displayable synthetic name.
    pub fn create_direct_room(&self) -> Result<i64, StorageError> {
        let name = format!("dm:{}", uuid::Uuid::new_v4());
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.lock();
        conn.execute(
            "INSERT INTO chat_room (name, room_type, created_at) VALUES (?1, 'DM', ?2)",
            params![name, now],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Deletes a room only if it is of type `DM`, used to reclaim an orphan
    /// room that lost a direct-chat pairing race.
    pub fn delete_if_dm(&self, room_id: i64) -> Result<(), StorageError> {
        let conn = self.lock();
        conn.execute(
            "DELETE FROM chat_room WHERE id = ?1 AND room_type = 'DM'",
            params![room_id],
        )?;
        Ok(())
    }
}
