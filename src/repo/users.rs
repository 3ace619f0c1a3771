use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Mutex, MutexGuard};

use crate::models::User;
use crate::repo::StorageError;

pub struct UserRepository<'a> {
    conn: &'a Mutex<Connection>,
}

impl<'a> UserRepository<'a> {
    pub fn new(conn: &'a Mutex<Connection>) -> Self {
        UserRepository { conn }
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Normalizes `username` (trim + lowercase) before lookup. Empty input
    /// never matches.
    pub fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let normalized = username.trim().to_lowercase();
        if normalized.is_empty() {
            return Ok(None);
        }
        let conn = self.lock();
        conn.query_row(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = ?1",
            params![normalized],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    password_hash: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(StorageError::from)
    }

    pub fn exists_by_username(&self, username: &str) -> Result<bool, StorageError> {
        Ok(self.find_by_username(username)?.is_some())
    }

    /// Inserts a new user with `created_at=now()`. Rejects a blank username
    /// or blank hash.
    pub fn insert(&self, username: &str, password_hash: &str) -> Result<i64, StorageError> {
        let normalized = username.trim().to_lowercase();
        if normalized.is_empty() || password_hash.is_empty() {
            return Err(StorageError::Invalid("username and password_hash must not be blank"));
        }
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.lock();
        conn.execute(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
            params![normalized, password_hash, now],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert-or-update: inserts `user` if `id <= 0` (not yet persisted),
    /// otherwise updates the existing row by id. Returns the row's id either
    /// way. Rejects a blank username or blank hash.
    pub fn save(&self, user: &User) -> Result<i64, StorageError> {
        if user.id <= 0 {
            self.insert(&user.username, &user.password_hash)
        } else {
            self.update(user)?;
            Ok(user.id)
        }
    }

    fn update(&self, user: &User) -> Result<(), StorageError> {
        let normalized = user.username.trim().to_lowercase();
        if normalized.is_empty() || user.password_hash.is_empty() {
            return Err(StorageError::Invalid("username and password_hash must not be blank"));
        }
        let conn = self.lock();
        conn.execute(
            "UPDATE users SET username = ?1, password_hash = ?2 WHERE id = ?3",
            params![normalized, user.password_hash, user.id],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<User>, StorageError> {
        let conn = self.lock();
        conn.query_row(
            "SELECT id, username, password_hash, created_at FROM users WHERE id = ?1",
            params![id],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    password_hash: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(StorageError::from)
    }
}
