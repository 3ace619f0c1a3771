pub mod direct_chat;
pub mod messages;
pub mod rooms;
pub mod users;

use std::fmt;

/// Single tagged error kind surfaced by every repository (C2), distinct from
/// per-field validation errors which are rejected before ever reaching SQL.
#[derive(Debug)]
pub enum StorageError {
    Sqlite(rusqlite::Error),
    Invalid(&'static str),
    NotFound,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Sqlite(e) => write!(f, "storage error: {e}"),
            StorageError::Invalid(msg) => write!(f, "invalid input: {msg}"),
            StorageError::NotFound => write!(f, "not found"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::Sqlite(e)
    }
}

/// `true` if a rusqlite error is a UNIQUE/PRIMARY KEY constraint violation.
/// Matches the reference codebase's string-matching idiom for race detection
/// (rusqlite does not expose a typed variant for this).
pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
    e.to_string().contains("UNIQUE")
}
