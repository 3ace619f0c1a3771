//! Concurrent client registry (C5): a map from `client_id` to its bound
//! username and output writer. Generalizes the reference codebase's
//! `PresenceTracker` (`Arc<RwLock<HashMap<...>>>`) with a per-client writer
//! lock so broadcast never interleaves writes to one socket and never
//! deadlocks on a slow recipient (each write is a single bounded call, not an
//! unbounded queue).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex as AsyncMutex;

use crate::models::Envelope;

struct ClientEntry {
    writer: AsyncMutex<OwnedWriteHalf>,
    username: RwLock<String>,
}

#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<u64, Arc<ClientEntry>>>,
}

fn encode(type_: &str, data: impl Serialize) -> Vec<u8> {
    let envelope = Envelope::new(type_, data);
    let mut line = serde_json::to_vec(&envelope).unwrap_or_default();
    line.push(b'\n');
    line
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, client_id: u64, writer: OwnedWriteHalf) {
        let entry = Arc::new(ClientEntry {
            writer: AsyncMutex::new(writer),
            username: RwLock::new(String::new()),
        });
        self.clients
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(client_id, entry);
    }

    pub fn remove(&self, client_id: u64) {
        self.clients
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&client_id);
    }

    pub fn bind_username(&self, client_id: u64, username: &str) {
        if let Some(entry) = self.clients.read().unwrap_or_else(|e| e.into_inner()).get(&client_id) {
            *entry.username.write().unwrap_or_else(|e| e.into_inner()) = username.to_string();
        }
    }

    pub fn username_of(&self, client_id: u64) -> Option<String> {
        let clients = self.clients.read().unwrap_or_else(|e| e.into_inner());
        let entry = clients.get(&client_id)?;
        let username = entry.username.read().unwrap_or_else(|e| e.into_inner()).clone();
        (!username.is_empty()).then_some(username)
    }

    fn snapshot(&self) -> Vec<(u64, Arc<ClientEntry>)> {
        self.clients
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(id, entry)| (*id, Arc::clone(entry)))
            .collect()
    }

    async fn write_to(&self, client_id: u64, entry: &Arc<ClientEntry>, line: &[u8]) -> bool {
        let mut writer = entry.writer.lock().await;
        if writer.write_all(line).await.is_ok() {
            true
        } else {
            drop(writer);
            self.remove(client_id);
            false
        }
    }

    /// Serializes `data` once and sends it to every currently registered
    /// client. A per-recipient failure evicts that client; it never affects
    /// delivery to the others.
    pub async fn broadcast(&self, type_: &str, data: impl Serialize) {
        let line = encode(type_, data);
        for (id, entry) in self.snapshot() {
            self.write_to(id, &entry, &line).await;
        }
    }

    pub async fn broadcast_except(&self, exclude_id: u64, type_: &str, data: impl Serialize) {
        let line = encode(type_, data);
        for (id, entry) in self.snapshot() {
            if id == exclude_id {
                continue;
            }
            self.write_to(id, &entry, &line).await;
        }
    }

    /// Returns `false` if the client is absent or the send failed.
    pub async fn send_to_client(&self, client_id: u64, type_: &str, data: impl Serialize) -> bool {
        let entry = {
            let clients = self.clients.read().unwrap_or_else(|e| e.into_inner());
            match clients.get(&client_id) {
                Some(e) => Arc::clone(e),
                None => return false,
            }
        };
        let line = encode(type_, data);
        self.write_to(client_id, &entry, &line).await
    }

    /// Finds the first client whose bound username matches case-insensitively
    /// and delegates to `send_to_client`.
    pub async fn send_to_user(&self, username: &str, type_: &str, data: impl Serialize) -> bool {
        let target = {
            let clients = self.clients.read().unwrap_or_else(|e| e.into_inner());
            clients.iter().find_map(|(id, entry)| {
                let bound = entry.username.read().unwrap_or_else(|e| e.into_inner());
                (!bound.is_empty() && bound.eq_ignore_ascii_case(username)).then_some(*id)
            })
        };
        match target {
            Some(id) => self.send_to_client(id, type_, data).await,
            None => false,
        }
    }

    /// Number of clients with a non-empty bound username at this instant.
    pub fn online_count(&self) -> usize {
        self.clients
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|e| !e.username.read().unwrap_or_else(|e| e.into_inner()).is_empty())
            .count()
    }

    /// Deduplicated, case-insensitive, lexicographically sorted bound usernames.
    pub fn online_snapshot(&self) -> Vec<String> {
        let clients = self.clients.read().unwrap_or_else(|e| e.into_inner());
        let mut seen = std::collections::BTreeSet::new();
        for entry in clients.values() {
            let username = entry.username.read().unwrap_or_else(|e| e.into_inner());
            if !username.is_empty() {
                seen.insert(username.to_lowercase());
            }
        }
        seen.into_iter().collect()
    }
}
