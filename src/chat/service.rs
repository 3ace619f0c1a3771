//! Room/DM persistence and history retrieval (C4). Ensures rooms and DM
//! pairings exist on first reference; delegates content validation to the
//! message repository so both paths produce identical errors.

use rusqlite::Connection;
use std::sync::Mutex;

use crate::models::{ChatMessageDto, DEFAULT_ROOM_NAME};
use crate::repo::direct_chat::DirectChatRepository;
use crate::repo::messages::MessageRepository;
use crate::repo::rooms::ChatRoomRepository;
use crate::repo::users::UserRepository;
use crate::repo::StorageError;

pub struct ChatService<'a> {
    conn: &'a Mutex<Connection>,
}

pub struct PostedMessage {
    pub room: String,
    pub from: String,
    pub to: Option<String>,
    pub content: String,
    pub sent_at: String,
}

impl<'a> ChatService<'a> {
    pub fn new(conn: &'a Mutex<Connection>) -> Self {
        ChatService { conn }
    }

    fn users(&self) -> UserRepository<'a> {
        UserRepository::new(self.conn)
    }
    fn rooms(&self) -> ChatRoomRepository<'a> {
        ChatRoomRepository::new(self.conn)
    }
    fn direct_chats(&self) -> DirectChatRepository<'a> {
        DirectChatRepository::new(self.conn)
    }
    fn messages(&self) -> MessageRepository<'a> {
        MessageRepository::new(self.conn)
    }

    pub fn post_to_room(
        &self,
        room: Option<&str>,
        from_user: &str,
        content: &str,
        sent_at: &str,
    ) -> Result<PostedMessage, StorageError> {
        let room_name = room.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(DEFAULT_ROOM_NAME);
        let room_id = self.rooms().create_room(room_name)?;

        let sender = self
            .users()
            .find_by_username(from_user)?
            .ok_or(StorageError::Invalid("user not found"))?;

        self.messages().save_message(room_id, sender.id, content, sent_at)?;

        Ok(PostedMessage {
            room: room_name.to_string(),
            from: sender.username,
            to: None,
            content: content.trim().to_string(),
            sent_at: sent_at.to_string(),
        })
    }

    pub fn post_direct(
        &self,
        from_user: &str,
        to_user: &str,
        content: &str,
        sent_at: &str,
    ) -> Result<PostedMessage, StorageError> {
        let sender = self
            .users()
            .find_by_username(from_user)?
            .ok_or(StorageError::Invalid("user not found"))?;
        let recipient = self
            .users()
            .find_by_username(to_user)?
            .ok_or(StorageError::Invalid("user not found"))?;

        let room_id = match self.direct_chats().find_dm_room_id(sender.id, recipient.id)? {
            Some(id) => id,
            None => {
                let new_room = self.rooms().create_direct_room()?;
                self.direct_chats().create_dm(sender.id, recipient.id, new_room)?
            }
        };

        self.messages().save_message(room_id, sender.id, content, sent_at)?;

        Ok(PostedMessage {
            room: String::new(),
            from: sender.username,
            to: Some(recipient.username),
            content: content.trim().to_string(),
            sent_at: sent_at.to_string(),
        })
    }

    /// Ensures the room exists (first-reference creation) and loads its
    /// history, projected with `room=<name>`, `to=null`.
    pub fn get_room_history(&self, room: &str, limit: i64) -> Result<Vec<ChatMessageDto>, StorageError> {
        let room_name = if room.trim().is_empty() { DEFAULT_ROOM_NAME } else { room.trim() };
        let room_id = self.rooms().create_room(room_name)?;
        let rows = self.messages().load_history(room_id, limit)?;
        Ok(rows
            .into_iter()
            .map(|m| ChatMessageDto {
                from: m.sender_username,
                to: None,
                content: m.content,
                sent_at: m.sent_at,
            })
            .collect())
    }

    /// Returns an empty history if no pairing exists yet, rather than
    /// creating one: a history request must not have the side effect of
    /// starting a DM.
    pub fn get_direct_history(
        &self,
        user_a: &str,
        user_b: &str,
        limit: i64,
    ) -> Result<Vec<ChatMessageDto>, StorageError> {
        let a = self.users().find_by_username(user_a)?.ok_or(StorageError::Invalid("user not found"))?;
        let b = self.users().find_by_username(user_b)?.ok_or(StorageError::Invalid("user not found"))?;

        let Some(room_id) = self.direct_chats().find_dm_room_id(a.id, b.id)? else {
            return Ok(Vec::new());
        };
        let rows = self.messages().load_history(room_id, limit)?;
        Ok(rows
            .into_iter()
            .map(|m| {
                let other = if m.sender_username.eq_ignore_ascii_case(&a.username) {
                    b.username.clone()
                } else {
                    a.username.clone()
                };
                ChatMessageDto {
                    from: m.sender_username,
                    to: Some(other),
                    content: m.content,
                    sent_at: m.sent_at,
                }
            })
            .collect())
    }
}
