//! Domain rows and wire-protocol DTOs.
//!
//! Domain rows (`User`, `ChatRoom`, `Message`) mirror the persisted schema in
//! `db.rs`. The `*Dto`/`*Data` types mirror the envelope `data` payloads
//! described in the wire protocol and follow the serde conventions the rest
//! of this codebase uses: optional fields default rather than fail on the
//! way in, and on the way out a `None` field serializes as JSON `null`
//! (never omitted) since the wire protocol requires explicit `room:null` /
//! `to:null` keys on every outgoing event.

use serde::{Deserialize, Serialize};

/// Room type discriminator, stored verbatim in `chat_room.room_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomType {
    Room,
    Dm,
}

impl RoomType {
    pub fn as_str(self) -> &'static str {
        match self {
            RoomType::Room => "ROOM",
            RoomType::Dm => "DM",
        }
    }
}

pub const DEFAULT_ROOM_NAME: &str = "General";
pub const DEFAULT_HISTORY_LIMIT: i64 = 150;
pub const MAX_CONTENT_LEN: usize = 1000;
pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 50;
pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_PASSWORD_LEN: usize = 100;

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: i64,
    pub chat_room_id: i64,
    pub sender_id: i64,
    pub sender_username: String,
    pub content: String,
    pub sent_at: String,
}

// ---------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------

/// The `{ "type": ..., "data": ... }` wrapper framed one-per-line over TCP.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Envelope {
    pub fn new(type_: &str, data: impl Serialize) -> Self {
        Envelope {
            type_: type_.to_string(),
            data: serde_json::to_value(data).unwrap_or(serde_json::Value::Null),
        }
    }
}

// ---------------------------------------------------------------------
// AUTH_REQUEST / AUTH_RESPONSE
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AuthRequestData {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponseData {
    pub username: String,
}

// ---------------------------------------------------------------------
// CHAT_MESSAGE
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ChatMessageInData {
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "sentAt", default)]
    pub sent_at: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct ChatMessageOutData {
    pub room: String,
    pub from: String,
    pub to: Option<String>,
    pub content: String,
    #[serde(rename = "sentAt")]
    pub sent_at: String,
}

// ---------------------------------------------------------------------
// DIRECT_MESSAGE
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct DirectMessageInData {
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "sentAt", default)]
    pub sent_at: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct DirectMessageOutData {
    pub room: Option<String>,
    pub from: String,
    pub to: String,
    pub content: String,
    #[serde(rename = "sentAt")]
    pub sent_at: String,
}

// ---------------------------------------------------------------------
// HISTORY_REQUEST / HISTORY_RESPONSE
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct HistoryRequestData {
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub peer: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Clone)]
pub struct ChatMessageDto {
    pub from: String,
    pub to: Option<String>,
    pub content: String,
    #[serde(rename = "sentAt")]
    pub sent_at: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponseData {
    pub scope: String,
    pub room: Option<String>,
    pub peer: Option<String>,
    pub messages: Vec<ChatMessageDto>,
}

// ---------------------------------------------------------------------
// USER_PRESENCE
// ---------------------------------------------------------------------

#[derive(Debug, Serialize, Clone)]
pub struct PresenceData {
    pub event: &'static str,
    pub username: String,
    #[serde(rename = "onlineCount")]
    pub online_count: usize,
}

// ---------------------------------------------------------------------
// ERROR
// ---------------------------------------------------------------------

#[derive(Debug, Serialize, Clone)]
pub struct ErrorData {
    pub code: &'static str,
    pub message: String,
}

impl ErrorData {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        ErrorData {
            code,
            message: message.into(),
        }
    }
}
