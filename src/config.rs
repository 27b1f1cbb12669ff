//! Configuration loaded from environment variables with defaults.

use std::env;
use std::time::Duration;

/// Credentials used by the PostgreSQL probe.
#[derive(Debug, Clone)]
pub struct PostgresProbeConfig {
    pub user: String,
    pub password: String,
    pub database: String,
    pub ssl_mode: String,
}

impl Default for PostgresProbeConfig {
    fn default() -> Self {
        Self {
            user: "postgres".to_string(),
            password: "password".to_string(),
            database: "service_weaver".to_string(),
            ssl_mode: "disable".to_string(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "service-weaver.db")
    pub db_path: String,
    /// Scheduler tick period (default: 5s)
    pub sched_tick: Duration,
    /// Subscriber inbox capacity (default: 100)
    pub hub_inbox_cap: usize,
    pub postgres_probe: PostgresProbeConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "service-weaver.db".to_string(),
            sched_tick: Duration::from_secs(5),
            hub_inbox_cap: 100,
            postgres_probe: PostgresProbeConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// - `HTTP_PORT`: web server port
    /// - `DB_PATH`: SQLite database file
    /// - `SCHED_TICK_SEC`: scheduler tick period in seconds
    /// - `HUB_INBOX_CAP`: per-subscriber inbox capacity
    /// - `DB_USER` / `DB_PASSWORD` / `DB_NAME` / `DB_SSLMODE`: PostgreSQL
    ///   probe connection parameters
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(port) = env::var("HTTP_PORT").unwrap_or_default().parse() {
            cfg.http_port = port;
        }
        if let Ok(db_path) = env::var("DB_PATH") {
            cfg.db_path = db_path;
        }
        if let Ok(secs) = env::var("SCHED_TICK_SEC").unwrap_or_default().parse::<u64>() {
            if secs > 0 {
                cfg.sched_tick = Duration::from_secs(secs);
            }
        }
        if let Ok(cap) = env::var("HUB_INBOX_CAP").unwrap_or_default().parse::<usize>() {
            if cap > 0 {
                cfg.hub_inbox_cap = cap;
            }
        }

        if let Ok(user) = env::var("DB_USER") {
            cfg.postgres_probe.user = user;
        }
        if let Ok(password) = env::var("DB_PASSWORD") {
            cfg.postgres_probe.password = password;
        }
        if let Ok(database) = env::var("DB_NAME") {
            cfg.postgres_probe.database = database;
        }
        if let Ok(ssl_mode) = env::var("DB_SSLMODE") {
            cfg.postgres_probe.ssl_mode = ssl_mode;
        }

        cfg
    }
}
