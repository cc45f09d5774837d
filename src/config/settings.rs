use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub sound: SoundConfig,
    #[serde(default)]
    pub listener: ListenerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// SSE keep-alive interval in seconds
    #[serde(default = "default_keep_alive_interval")]
    pub keep_alive_interval: u64,
}

/// Durable local storage for the store state
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Backend type: "file" (default) or "memory"
    #[serde(default = "default_storage_backend")]
    pub backend: String,
    /// Directory holding the state file
    #[serde(default = "default_storage_dir")]
    pub dir: String,
    /// Fixed namespace key; the file is `<dir>/<key>.json`
    #[serde(default = "default_storage_key")]
    pub key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// Reject notifications below the category's `minPriority`
    #[serde(default)]
    pub enforce_min_priority: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SoundConfig {
    /// Whether this host can play audio at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Root directory containing `sounds/<cue>.mp3`
    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,
    /// Player executable invoked with the clip path
    #[serde(default = "default_player_command")]
    pub command: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListenerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_listener_url")]
    pub url: String,
    /// Delay between reconnect attempts in seconds (fixed policy)
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_seconds: u64,
    /// Reconnect policy: "fixed" (default) or "exponential"
    #[serde(default = "default_backoff")]
    pub backoff: String,
    /// Upper bound for the exponential policy, in seconds
    #[serde(default = "default_max_reconnect_delay")]
    pub max_reconnect_delay_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Output format: "pretty" (default) or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_keep_alive_interval() -> u64 {
    30 // 30 seconds
}

fn default_storage_backend() -> String {
    "file".to_string()
}

fn default_storage_dir() -> String {
    "data".to_string()
}

fn default_storage_key() -> String {
    "notification-storage".to_string()
}

fn default_true() -> bool {
    true
}

fn default_assets_dir() -> String {
    "public".to_string()
}

fn default_player_command() -> String {
    "paplay".to_string()
}

fn default_listener_url() -> String {
    "ws://localhost:3000/ws".to_string()
}

fn default_reconnect_delay() -> u64 {
    5 // 5 seconds
}

fn default_backoff() -> String {
    "fixed".to_string()
}

fn default_max_reconnect_delay() -> u64 {
    60 // 1 minute
}

fn default_log_format() -> String {
    "pretty".to_string()
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
            .set_default("storage.backend", default_storage_backend())?
            .set_default("storage.dir", default_storage_dir())?
            .set_default("storage.key", default_storage_key())?
            .set_default("listener.url", default_listener_url())?
            .set_default("listener.reconnect_delay_seconds", default_reconnect_delay() as i64)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // FARM_SERVER__PORT, FARM_STORAGE__DIR, FARM_LISTENER__RECONNECT_DELAY_SECONDS, etc.
            .add_source(
                Environment::with_prefix("FARM")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            keep_alive_interval: default_keep_alive_interval(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            dir: default_storage_dir(),
            key: default_storage_key(),
        }
    }
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            assets_dir: default_assets_dir(),
            command: default_player_command(),
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_listener_url(),
            reconnect_delay_seconds: default_reconnect_delay(),
            backoff: default_backoff(),
            max_reconnect_delay_seconds: default_max_reconnect_delay(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "127.0.0.1");
        assert_eq!(server.port, 8090);

        let storage = StorageConfig::default();
        assert_eq!(storage.backend, "file");
        assert_eq!(storage.key, "notification-storage");

        let listener = ListenerConfig::default();
        assert_eq!(listener.reconnect_delay_seconds, 5);
        assert_eq!(listener.backoff, "fixed");

        assert!(!StoreConfig::default().enforce_min_priority);
    }
}
