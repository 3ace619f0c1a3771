//! Binds the listening TCP socket and hands each accepted connection off to
//! the connection handler (C6), tagging it with a monotonic `client_id`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::db::Db;
use crate::handler::handle_connection;
use crate::registry::ClientRegistry;

pub struct Acceptor {
    listener: TcpListener,
    next_client_id: AtomicU64,
}

impl Acceptor {
    pub async fn bind(config: &ServerConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind(config.bind_addr()).await?;
        Ok(Acceptor {
            listener,
            next_client_id: AtomicU64::new(1),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the listener errs (or is dropped); each
    /// accepted socket gets `TCP_NODELAY` and is handed to a freshly spawned
    /// handler task.
    pub async fn serve(self, db: Arc<Db>, registry: Arc<ClientRegistry>, config: Arc<ServerConfig>) {
        println!("chat server listening on {}", config.bind_addr());
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let client_id = self.next_client_id.fetch_add(1, Ordering::SeqCst);
                    let db = Arc::clone(&db);
                    let registry = Arc::clone(&registry);
                    let config = Arc::clone(&config);
                    tokio::spawn(async move {
                        handle_connection(stream, client_id, db, registry, config).await;
                    });
                    let _ = addr;
                }
                Err(e) => {
                    eprintln!("accept failed: {e}");
                    break;
                }
            }
        }
    }
}
