use std::env;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub catchup: CatchUpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    /// Liveness deadline: a connection with no inbound traffic for this long
    /// is considered dead.
    #[serde(default = "default_pong_wait")]
    pub pong_wait_seconds: u64,
    /// Deadline for a single write to the wire.
    #[serde(default = "default_write_wait")]
    pub write_wait_seconds: u64,
    /// Maximum inbound message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatchUpConfig {
    /// Safety skew subtracted from the last-disconnect time, tolerating clock
    /// drift and writes that raced the disconnect.
    #[serde(default = "default_catchup_skew")]
    pub skew_seconds: i64,
    /// Upper bound on notifications replayed per reconnect.
    #[serde(default = "default_catchup_limit")]
    pub max_notifications: i64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_database_url() -> String {
    "postgres://localhost/notifications".to_string()
}

fn default_pool_size() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_pong_wait() -> u64 {
    60
}

fn default_write_wait() -> u64 {
    10
}

fn default_max_message_size() -> usize {
    8192
}

fn default_catchup_skew() -> i64 {
    5
}

fn default_catchup_limit() -> i64 {
    100
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("database.url", default_database_url())?
            .set_default("websocket.pong_wait_seconds", default_pong_wait() as i64)?
            .set_default("websocket.write_wait_seconds", default_write_wait() as i64)?
            .set_default("catchup.skew_seconds", default_catchup_skew())?
            .set_default("catchup.max_notifications", default_catchup_limit())?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // SERVER_HOST, SERVER_PORT, DATABASE_URL, etc.
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl WebSocketConfig {
    pub fn pong_wait(&self) -> Duration {
        Duration::from_secs(self.pong_wait_seconds)
    }

    pub fn write_wait(&self) -> Duration {
        Duration::from_secs(self.write_wait_seconds)
    }

    /// Keepalive ping interval. Must stay safely below the peer's liveness
    /// deadline; 90% of it, matching the wait it has to beat.
    pub fn ping_period(&self) -> Duration {
        Duration::from_millis(self.pong_wait_seconds * 900)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            pong_wait_seconds: default_pong_wait(),
            write_wait_seconds: default_write_wait(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl Default for CatchUpConfig {
    fn default() -> Self {
        Self {
            skew_seconds: default_catchup_skew(),
            max_notifications: default_catchup_limit(),
        }
    }
}
