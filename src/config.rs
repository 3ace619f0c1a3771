//! `ServerConfig::from_env()` — environment-backed configuration, in the
//! shape of the reference codebase's `RateLimitConfig::from_env()`: each
//! recognized key overrides a sensible default, and anything unset or
//! unparsable silently falls back rather than failing startup.

use std::env;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// `dev` enables seed hooks, `prod` disables. Reserved for future use;
    /// the core has no dev-only seed behavior beyond the default room.
    pub app_env: String,
    /// `schema` runs DDL on startup, `never` skips it.
    pub db_init_mode: String,
    pub db_path: String,
    pub history_default_limit: i64,
    pub read_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "localhost".to_string(),
            port: 8080,
            app_env: "prod".to_string(),
            db_init_mode: "schema".to_string(),
            db_path: "chat.db".to_string(),
            history_default_limit: 150,
            read_timeout_secs: 2,
        }
    }
}

impl ServerConfig {
    /// Loads from `CHAT_SERVER_HOST`, `CHAT_SERVER_PORT`, `CHAT_APP_ENV`,
    /// `CHAT_DB_INIT_MODE`, `CHAT_DB_PATH`, `CHAT_HISTORY_DEFAULT_LIMIT`,
    /// `CHAT_READ_TIMEOUT_SECS`. A malformed `CHAT_SERVER_PORT` is the only
    /// key treated as fatal, since the acceptor cannot bind without one.
    pub fn from_env() -> Result<Self, String> {
        let mut config = Self::default();

        if let Ok(val) = env::var("CHAT_SERVER_HOST") {
            config.host = val;
        }
        if let Ok(val) = env::var("CHAT_SERVER_PORT") {
            config.port = val
                .parse()
                .map_err(|_| format!("CHAT_SERVER_PORT must be a valid port number, got {val:?}"))?;
        }
        if let Ok(val) = env::var("CHAT_APP_ENV") {
            config.app_env = val;
        }
        if let Ok(val) = env::var("CHAT_DB_INIT_MODE") {
            config.db_init_mode = val;
        }
        if let Ok(val) = env::var("CHAT_DB_PATH") {
            config.db_path = val;
        }
        if let Ok(val) = env::var("CHAT_HISTORY_DEFAULT_LIMIT")
            && let Ok(n) = val.parse::<i64>()
        {
            config.history_default_limit = n;
        }
        if let Ok(val) = env::var("CHAT_READ_TIMEOUT_SECS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.read_timeout_secs = n;
        }

        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
