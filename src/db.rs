use rusqlite::Connection;
use std::sync::Mutex;

/// Shared handle to the SQLite store. All access is serialized behind a single
/// connection, matching the store's own assumption that it serializes concurrent
/// callers.
pub struct Db {
    pub conn: Mutex<Connection>,
}

impl Db {
    /// Opens (creating if necessary) the database at `path` and runs migrations.
    pub fn new(path: &str) -> Self {
        let conn = Connection::open(path).expect("failed to open database");
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .expect("failed to set pragmas");
        let db = Db {
            conn: Mutex::new(conn),
        };
        db.migrate();
        db
    }

    /// Opens an in-memory database. Used by tests so nothing touches disk.
    pub fn new_in_memory() -> Self {
        let conn = Connection::open_in_memory().expect("failed to open in-memory database");
        conn.execute_batch("PRAGMA foreign_keys=ON;").ok();
        let db = Db {
            conn: Mutex::new(conn),
        };
        db.migrate();
        db
    }

    fn migrate(&self) {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chat_room (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                room_type TEXT NOT NULL CHECK (room_type IN ('ROOM', 'DM')),
                created_at TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_chat_room_name_room
                ON chat_room(name) WHERE room_type = 'ROOM';

            CREATE TABLE IF NOT EXISTS message (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_room_id INTEGER NOT NULL REFERENCES chat_room(id) ON DELETE CASCADE,
                sender_id INTEGER NOT NULL REFERENCES users(id),
                content TEXT NOT NULL,
                sent_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_message_room_sent ON message(chat_room_id, sent_at);

            CREATE TABLE IF NOT EXISTS direct_chat (
                chat_room_id INTEGER NOT NULL REFERENCES chat_room(id) ON DELETE CASCADE,
                user_low_id INTEGER NOT NULL REFERENCES users(id),
                user_high_id INTEGER NOT NULL REFERENCES users(id),
                UNIQUE(user_low_id, user_high_id),
                CHECK (user_low_id < user_high_id)
            );

            CREATE TABLE IF NOT EXISTS user_chat_room (
                user_id INTEGER NOT NULL REFERENCES users(id),
                chat_room_id INTEGER NOT NULL REFERENCES chat_room(id) ON DELETE CASCADE,
                joined_at TEXT NOT NULL,
                PRIMARY KEY (user_id, chat_room_id)
            );",
        )
        .expect("failed to run migrations");

        // Seed the default public room if it doesn't exist yet.
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM chat_room WHERE name = 'General' AND room_type = 'ROOM'",
                [],
                |r| r.get(0),
            )
            .unwrap_or(0);
        if count == 0 {
            let now = chrono::Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO chat_room (name, room_type, created_at) VALUES (?1, 'ROOM', ?2)",
                rusqlite::params!["General", &now],
            )
            .ok();
        }
    }
}
