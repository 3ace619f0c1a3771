//! Per-connection protocol state machine (C6): parses envelopes via the
//! codec in `models.rs` and dispatches to the auth and chat services and the
//! client registry.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use crate::auth::{AuthErrorCode, AuthService};
use crate::chat::ChatService;
use crate::config::ServerConfig;
use crate::db::Db;
use crate::models::{
    AuthRequestData, AuthResponseData, ChatMessageDto, ChatMessageInData, ChatMessageOutData,
    DirectMessageInData, DirectMessageOutData, ErrorData, HistoryRequestData, HistoryResponseData,
    PresenceData, DEFAULT_ROOM_NAME,
};
use crate::registry::ClientRegistry;

/// Drives one accepted connection end to end. Registers immediately on
/// entry and guarantees eviction (and, if bound, a `userLeft` broadcast) on
/// every exit path.
pub async fn handle_connection(
    stream: TcpStream,
    client_id: u64,
    db: Arc<Db>,
    registry: Arc<ClientRegistry>,
    config: Arc<ServerConfig>,
) {
    let _ = stream.set_nodelay(true);
    let (mut reader, write_half) = stream.into_split();
    registry.add(client_id, write_half);

    // `AsyncReadExt::read` (unlike `AsyncBufReadExt::read_line`) is
    // cancellation-safe: dropping the timeout future never discards bytes
    // already pulled off the socket. Frames are reassembled from a
    // persistent byte buffer and split on `\n` ourselves so a periodic read
    // timeout can never corrupt or drop a frame fragmented across it.
    let mut pending: Vec<u8> = Vec::new();
    let mut buf = [0u8; 4096];
    let mut authenticated = false;
    let mut bound_username: Option<String> = None;
    let read_timeout = Duration::from_secs(config.read_timeout_secs.max(1));

    'session: loop {
        while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            let trimmed = line.trim_end_matches(['\n', '\r']);
            if trimmed.is_empty() {
                continue;
            }
            let should_close = dispatch_line(
                trimmed,
                client_id,
                &db,
                &registry,
                &config,
                &mut authenticated,
                &mut bound_username,
            )
            .await;
            if should_close {
                break 'session;
            }
        }

        let read_result = tokio::time::timeout(read_timeout, reader.read(&mut buf)).await;
        match read_result {
            Err(_) => continue, // periodic timeout, not a close signal
            Ok(Err(_)) => break, // I/O error
            Ok(Ok(0)) => break,  // EOF
            Ok(Ok(n)) => pending.extend_from_slice(&buf[..n]),
        }
    }

    registry.remove(client_id);
    if let Some(username) = bound_username {
        let online_count = registry.online_count();
        registry
            .broadcast(
                "USER_PRESENCE",
                PresenceData {
                    event: "userLeft",
                    username,
                    online_count,
                },
            )
            .await;
    }
}

async fn send_error(registry: &ClientRegistry, client_id: u64, code: &'static str, message: impl Into<String>) {
    registry
        .send_to_client(client_id, "ERROR", ErrorData::new(code, message))
        .await;
}

#[allow(clippy::too_many_arguments)]
async fn dispatch_line(
    line: &str,
    client_id: u64,
    db: &Arc<Db>,
    registry: &Arc<ClientRegistry>,
    config: &Arc<ServerConfig>,
    authenticated: &mut bool,
    bound_username: &mut Option<String>,
) -> bool {
    let envelope: crate::models::Envelope = match serde_json::from_str(line) {
        Ok(e) => e,
        Err(_) => {
            send_error(registry, client_id, "INVALID_JSON", "malformed JSON envelope").await;
            return false;
        }
    };

    let type_ = envelope.type_.trim();
    if type_.is_empty() {
        send_error(registry, client_id, "INVALID_REQUEST", "missing message type").await;
        return false;
    }
    let type_upper = type_.to_uppercase();

    if !*authenticated && type_upper != "AUTH_REQUEST" {
        send_error(registry, client_id, "UNAUTHORIZED", "authentication required").await;
        return false;
    }

    match type_upper.as_str() {
        "AUTH_REQUEST" => {
            handle_auth_request(envelope.data, client_id, db, registry, config, authenticated, bound_username).await;
            false
        }
        "CHAT_MESSAGE" => {
            handle_chat_message(envelope.data, client_id, db, registry, bound_username).await;
            false
        }
        "DIRECT_MESSAGE" => {
            handle_direct_message(envelope.data, client_id, db, registry, bound_username).await;
            false
        }
        "HISTORY_REQUEST" => {
            handle_history_request(envelope.data, client_id, db, registry, config).await;
            false
        }
        "LOGOUT" => handle_logout(client_id, registry, authenticated, bound_username).await,
        _ => {
            send_error(registry, client_id, "UNKNOWN_TYPE", format!("unknown message type {type_:?}")).await;
            false
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_auth_request(
    data: serde_json::Value,
    client_id: u64,
    db: &Arc<Db>,
    registry: &Arc<ClientRegistry>,
    config: &Arc<ServerConfig>,
    authenticated: &mut bool,
    bound_username: &mut Option<String>,
) {
    let req: AuthRequestData = match serde_json::from_value(data) {
        Ok(r) => r,
        Err(_) => {
            send_error(registry, client_id, "INVALID_REQUEST", "malformed AUTH_REQUEST payload").await;
            return;
        }
    };
    let action = req.action.trim().to_uppercase();

    let outcome = {
        let conn = &db.conn;
        let auth = AuthService::new(crate::repo::users::UserRepository::new(conn));
        match action.as_str() {
            "LOGIN" => auth.login(&req.username, &req.password),
            "REGISTER" => auth.register(&req.username, &req.password),
            "" => {
                send_error(registry, client_id, "UNKNOWN_ACTION", "action is required").await;
                return;
            }
            _ => {
                send_error(registry, client_id, "UNKNOWN_ACTION", format!("unknown action {action:?}")).await;
                return;
            }
        }
    };

    match outcome {
        Err(failure) => {
            send_error(registry, client_id, failure.code.as_str(), failure.message).await;
        }
        Ok(success) => {
            registry.bind_username(client_id, &success.username);
            *authenticated = true;
            *bound_username = Some(success.username.clone());

            registry
                .send_to_client(
                    client_id,
                    "AUTH_RESPONSE",
                    AuthResponseData { username: success.username.clone() },
                )
                .await;

            let history = {
                let chat = ChatService::new(&db.conn);
                chat.get_room_history(DEFAULT_ROOM_NAME, config.history_default_limit)
                    .unwrap_or_default()
            };
            registry
                .send_to_client(
                    client_id,
                    "HISTORY_RESPONSE",
                    HistoryResponseData {
                        scope: "ROOM".to_string(),
                        room: Some(DEFAULT_ROOM_NAME.to_string()),
                        peer: None,
                        messages: history,
                    },
                )
                .await;

            let online_count = registry.online_count();
            registry
                .broadcast(
                    "USER_PRESENCE",
                    PresenceData {
                        event: "userJoined",
                        username: success.username,
                        online_count,
                    },
                )
                .await;
        }
    }
}

async fn handle_chat_message(
    data: serde_json::Value,
    client_id: u64,
    db: &Arc<Db>,
    registry: &Arc<ClientRegistry>,
    bound_username: &Option<String>,
) {
    let Some(from) = bound_username.clone() else {
        send_error(registry, client_id, "UNAUTHORIZED", "authentication required").await;
        return;
    };
    let req: ChatMessageInData = match serde_json::from_value(data) {
        Ok(r) => r,
        Err(_) => {
            send_error(registry, client_id, "INVALID_REQUEST", "malformed CHAT_MESSAGE payload").await;
            return;
        }
    };

    if req.content.trim().is_empty() {
        send_error(registry, client_id, "VALIDATION_ERROR", "content must not be blank").await;
        return;
    }
    if req.content.trim().chars().count() > crate::models::MAX_CONTENT_LEN {
        send_error(registry, client_id, "VALIDATION_ERROR", "content exceeds maximum length").await;
        return;
    }

    let sent_at = req.sent_at.unwrap_or_else(now_local);
    let posted = {
        let chat = ChatService::new(&db.conn);
        chat.post_to_room(req.room.as_deref(), &from, &req.content, &sent_at)
    };

    match posted {
        Ok(posted) => {
            registry
                .broadcast(
                    "CHAT_MESSAGE",
                    ChatMessageOutData {
                        room: posted.room,
                        from: posted.from,
                        to: None,
                        content: posted.content,
                        sent_at: posted.sent_at,
                    },
                )
                .await;
        }
        Err(e) => {
            send_error(registry, client_id, "DATABASE_ERROR", e.to_string()).await;
        }
    }
}

async fn handle_direct_message(
    data: serde_json::Value,
    client_id: u64,
    db: &Arc<Db>,
    registry: &Arc<ClientRegistry>,
    bound_username: &Option<String>,
) {
    let Some(from) = bound_username.clone() else {
        send_error(registry, client_id, "UNAUTHORIZED", "authentication required").await;
        return;
    };
    let req: DirectMessageInData = match serde_json::from_value(data) {
        Ok(r) => r,
        Err(_) => {
            send_error(registry, client_id, "INVALID_REQUEST", "malformed DIRECT_MESSAGE payload").await;
            return;
        }
    };
    if req.to.trim().is_empty() {
        send_error(registry, client_id, "VALIDATION_ERROR", "to is required").await;
        return;
    }
    if req.content.trim().is_empty() {
        send_error(registry, client_id, "VALIDATION_ERROR", "content must not be blank").await;
        return;
    }
    if req.content.trim().chars().count() > crate::models::MAX_CONTENT_LEN {
        send_error(registry, client_id, "VALIDATION_ERROR", "content exceeds maximum length").await;
        return;
    }

    let sent_at = req.sent_at.unwrap_or_else(now_local);
    let posted = {
        let chat = ChatService::new(&db.conn);
        chat.post_direct(&from, &req.to, &req.content, &sent_at)
    };

    match posted {
        Ok(posted) => {
            let event = DirectMessageOutData {
                room: None,
                from: posted.from,
                to: posted.to.clone().unwrap_or_default(),
                content: posted.content,
                sent_at: posted.sent_at,
            };
            let delivered = registry.send_to_user(&req.to, "DIRECT_MESSAGE", event.clone()).await;
            if !delivered {
                send_error(registry, client_id, "USER_OFFLINE", format!("{} is not connected", req.to)).await;
            }
            registry.send_to_client(client_id, "DIRECT_MESSAGE", event).await;
        }
        Err(e) => {
            send_error(registry, client_id, "DATABASE_ERROR", e.to_string()).await;
        }
    }
}

async fn handle_history_request(
    data: serde_json::Value,
    client_id: u64,
    db: &Arc<Db>,
    registry: &Arc<ClientRegistry>,
    config: &Arc<ServerConfig>,
) {
    let req: HistoryRequestData = match serde_json::from_value(data) {
        Ok(r) => r,
        Err(_) => {
            send_error(registry, client_id, "INVALID_REQUEST", "malformed HISTORY_REQUEST payload").await;
            return;
        }
    };
    let limit = match req.limit {
        Some(n) if n > 0 => n,
        _ => config.history_default_limit,
    };
    let scope = req.scope.trim().to_uppercase();

    match scope.as_str() {
        "ROOM" => {
            let Some(room) = req.room.filter(|r| !r.trim().is_empty()) else {
                send_error(registry, client_id, "VALIDATION_ERROR", "room is required for ROOM scope").await;
                return;
            };
            let messages = {
                let chat = ChatService::new(&db.conn);
                chat.get_room_history(&room, limit).unwrap_or_default()
            };
            registry
                .send_to_client(
                    client_id,
                    "HISTORY_RESPONSE",
                    HistoryResponseData { scope: "ROOM".to_string(), room: Some(room), peer: None, messages },
                )
                .await;
        }
        "DM" => {
            let Some(peer) = req.peer.filter(|p| !p.trim().is_empty()) else {
                send_error(registry, client_id, "VALIDATION_ERROR", "peer is required for DM scope").await;
                return;
            };
            let Some(self_username) = registry.username_of(client_id) else {
                send_error(registry, client_id, "UNAUTHORIZED", "authentication required").await;
                return;
            };
            let messages: Vec<ChatMessageDto> = {
                let chat = ChatService::new(&db.conn);
                chat.get_direct_history(&self_username, &peer, limit).unwrap_or_default()
            };
            registry
                .send_to_client(
                    client_id,
                    "HISTORY_RESPONSE",
                    HistoryResponseData { scope: "DM".to_string(), room: None, peer: Some(peer), messages },
                )
                .await;
        }
        _ => {
            send_error(registry, client_id, "UNKNOWN_SCOPE", format!("unknown scope {scope:?}")).await;
        }
    }
}

async fn handle_logout(
    client_id: u64,
    registry: &Arc<ClientRegistry>,
    authenticated: &mut bool,
    bound_username: &mut Option<String>,
) -> bool {
    if !*authenticated {
        send_error(registry, client_id, "UNAUTHORIZED", "authentication required").await;
        return false;
    }
    registry.remove(client_id);
    if let Some(username) = bound_username.take() {
        let online_count = registry.online_count();
        registry
            .broadcast("USER_PRESENCE", PresenceData { event: "userLeft", username, online_count })
            .await;
    }
    *authenticated = false;
    true
}

fn now_local() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}
