//! Shared harness: boots the server on an ephemeral port against a unique
//! temp SQLite file per test, deletes the DB (and `-wal`/`-shm`) on `Drop`.
//! Transport here is raw TCP rather than an in-process HTTP client, so each
//! test drives one or more `TestClient`s against a `TestServer`.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;

use chat_server::config::ServerConfig;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestServer {
    pub addr: std::net::SocketAddr,
    db_path: String,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
        let _ = std::fs::remove_file(&self.db_path);
        let _ = std::fs::remove_file(format!("{}-wal", self.db_path));
        let _ = std::fs::remove_file(format!("{}-shm", self.db_path));
    }
}

/// Boots a fresh server against a throwaway DB file and returns it already
/// listening. One instance per test avoids state bleeding between tests that
/// all register users named "alice"/"bob".
pub async fn test_server() -> TestServer {
    let db_path = format!(
        "/tmp/chat_server_test_{}.db",
        uuid::Uuid::new_v4().to_string().split('-').next().unwrap()
    );
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        db_path: db_path.clone(),
        read_timeout_secs: 1,
        ..ServerConfig::default()
    };
    let (addr, handle) = chat_server::run_on_ephemeral_port(config)
        .await
        .expect("server must bind on ephemeral port");
    TestServer { addr, db_path, handle }
}

/// A line-oriented TCP client: connect, send a JSON envelope, read one back.
pub struct TestClient {
    write: tokio::net::tcp::OwnedWriteHalf,
    read: BufReader<OwnedReadHalf>,
}

impl TestClient {
    pub async fn connect(server: &TestServer) -> Self {
        let stream = TcpStream::connect(server.addr).await.expect("connect to test server");
        let (read, write) = stream.into_split();
        TestClient { write, read: BufReader::new(read) }
    }

    pub async fn send(&mut self, type_: &str, data: serde_json::Value) {
        let envelope = serde_json::json!({ "type": type_, "data": data });
        let mut line = serde_json::to_vec(&envelope).unwrap();
        line.push(b'\n');
        self.write.write_all(&line).await.expect("write envelope");
    }

    /// Sends a raw, possibly-malformed line, bypassing JSON construction.
    pub async fn send_raw(&mut self, raw: &str) {
        let mut line = raw.as_bytes().to_vec();
        line.push(b'\n');
        self.write.write_all(&line).await.expect("write raw line");
    }

    pub async fn recv(&mut self) -> serde_json::Value {
        let mut line = String::new();
        tokio::time::timeout(RECV_TIMEOUT, self.read.read_line(&mut line))
            .await
            .expect("timed out waiting for a response")
            .expect("read response line");
        serde_json::from_str(line.trim_end()).expect("response line must be valid JSON")
    }

    pub async fn auth(&mut self, action: &str, username: &str, password: &str) -> serde_json::Value {
        self.send(
            "AUTH_REQUEST",
            serde_json::json!({ "action": action, "username": username, "password": password }),
        )
        .await;
        self.recv().await
    }

    /// Registers and drains the AUTH_RESPONSE, HISTORY_RESPONSE, and the
    /// client's own `userJoined` broadcast (the registry broadcasts to every
    /// connected client, including the one that just authenticated).
    pub async fn register_and_drain(&mut self, username: &str, password: &str) {
        let resp = self.auth("REGISTER", username, password).await;
        assert_eq!(resp["type"], "AUTH_RESPONSE", "unexpected response: {resp}");
        let history = self.recv().await;
        assert_eq!(history["type"], "HISTORY_RESPONSE", "unexpected response: {history}");
        let presence = self.recv().await;
        assert_eq!(presence["type"], "USER_PRESENCE", "unexpected response: {presence}");
    }
}
