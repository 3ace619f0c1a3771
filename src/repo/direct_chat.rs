use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Mutex, MutexGuard};

use crate::repo::rooms::ChatRoomRepository;
use crate::repo::{is_unique_violation, StorageError};

pub struct DirectChatRepository<'a> {
    conn: &'a Mutex<Connection>,
}

impl<'a> DirectChatRepository<'a> {
    pub fn new(conn: &'a Mutex<Connection>) -> Self {
        DirectChatRepository { conn }
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pair is ordered `(min, max)`. Rejects `a == b` or either id `<= 0`.
    pub fn find_dm_room_id(&self, a: i64, b: i64) -> Result<Option<i64>, StorageError> {
        if a == b || a <= 0 || b <= 0 {
            return Err(StorageError::Invalid("a direct chat requires two distinct, positive user ids"));
        }
        let (low, high) = (a.min(b), a.max(b));
        let conn = self.lock();
        conn.query_row(
            "SELECT chat_room_id FROM direct_chat WHERE user_low_id = ?1 AND user_high_id = ?2",
            params![low, high],
            |row| row.get(0),
        )
        .optional()
        .map_err(StorageError::from)
    }

    /// Binds a pre-created DM room to the ordered pair. If another writer
    /// already won the pairing race, the now-orphan `room_id` (only if it is
    /// still a `DM` room) is reclaimed and the winner's room id is returned.
    pub fn create_dm(&self, a: i64, b: i64, room_id: i64) -> Result<i64, StorageError> {
        if a == b || a <= 0 || b <= 0 {
            return Err(StorageError::Invalid("a direct chat requires two distinct, positive user ids"));
        }
        let (low, high) = (a.min(b), a.max(b));
        {
            let conn = self.lock();
            match conn.execute(
                "INSERT INTO direct_chat (chat_room_id, user_low_id, user_high_id) VALUES (?1, ?2, ?3)",
                params![room_id, low, high],
            ) {
                Ok(_) => return Ok(room_id),
                Err(e) if is_unique_violation(&e) => {}
                Err(e) => return Err(StorageError::from(e)),
            }
        }

        // Lost the race: look up the winner and reclaim our orphan room.
        let existing = self.find_dm_room_id(low, high)?.ok_or(StorageError::NotFound)?;
        if existing != room_id {
            // Best-effort cleanup; failure here must not fail the DM send.
            let rooms = ChatRoomRepository::new(self.conn);
            let _ = rooms.delete_if_dm(room_id);
        }
        Ok(existing)
    }
}
