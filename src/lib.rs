pub mod acceptor;
pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod handler;
pub mod models;
pub mod registry;
pub mod repo;

use std::sync::Arc;

use acceptor::Acceptor;
use config::ServerConfig;
use db::Db;
use registry::ClientRegistry;

/// Opens the store, runs migrations if configured to, wires up the shared
/// client registry, and starts the acceptor loop. Blocks until the listener
/// stops accepting connections.
pub async fn run(config: ServerConfig) -> std::io::Result<()> {
    let db = Arc::new(open_db(&config));
    let registry = Arc::new(ClientRegistry::new());
    let config = Arc::new(config);

    let acceptor = Acceptor::bind(&config).await?;
    acceptor.serve(db, registry, config).await;
    Ok(())
}

/// Test/embedding entry point: binds on an OS-assigned port and returns the
/// bound address alongside a handle to the spawned server task, so callers
/// don't need to guess a free port.
pub async fn run_on_ephemeral_port(mut config: ServerConfig) -> std::io::Result<(std::net::SocketAddr, tokio::task::JoinHandle<()>)> {
    config.port = 0;
    let db = Arc::new(open_db(&config));
    let registry = Arc::new(ClientRegistry::new());
    let config = Arc::new(config);

    let acceptor = Acceptor::bind(&config).await?;
    let addr = acceptor.local_addr()?;
    let handle = tokio::spawn(async move {
        acceptor.serve(db, registry, config).await;
    });
    Ok((addr, handle))
}

fn open_db(config: &ServerConfig) -> Db {
    if config.db_init_mode == "never" {
        // Caller asserts the schema already exists; still open the file, just
        // skip migrations.
        let conn = rusqlite::Connection::open(&config.db_path).expect("failed to open database");
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;").ok();
        return Db { conn: std::sync::Mutex::new(conn) };
    }
    Db::new(&config.db_path)
}
