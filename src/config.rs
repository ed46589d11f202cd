//! # Configuration Management
//!
//! Centralized configuration for the world server protocol core.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`
//!
//! ## Sections
//! - `server`: listener, per-session queue depth, timeouts
//! - `cluster`: where logout redirects point (game cluster or auth server)
//! - `world`: districts, fallback map, packet blobs, packet logging
//! - `logging`: subscriber settings

use crate::error::{ProtocolError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// Map id whose players-request also receives the NPC blob
pub const NPC_MAP_ID: i32 = 10003;

/// Largest frame accepted from a client
pub const MAX_FRAME_SIZE: usize = 16 * 1024;

/// Main configuration structure containing all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct WorldConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub cluster: ClusterConfig,

    #[serde(default)]
    pub world: GameConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WorldConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Defaults with `WORLD_PROTOCOL_*` environment overrides applied
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("WORLD_PROTOCOL_SERVER_ADDRESS") {
            config.server.address = addr;
        }

        if let Ok(addr) = std::env::var("WORLD_PROTOCOL_GAME_SERVER_ADDRESS") {
            config.cluster.game_server = addr;
        }

        if let Ok(addr) = std::env::var("WORLD_PROTOCOL_AUTH_SERVER_ADDRESS") {
            config.cluster.auth_server = addr;
        }

        if let Ok(timeout) = std::env::var("WORLD_PROTOCOL_CONNECTION_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.server.connection_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(folder) = std::env::var("WORLD_PROTOCOL_PACKETS_FOLDER") {
            config.world.packets_folder = PathBuf::from(folder);
        }

        if let Ok(flag) = std::env::var("WORLD_PROTOCOL_LOG_PACKETS") {
            config.world.log_packets = matches!(flag.as_str(), "1" | "true" | "yes");
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Returns a list of validation errors; empty means valid
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.cluster.validate());
        errors.extend(self.world.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Listener and per-connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0:10100")
    pub address: String,

    /// Outbound frames queued per session before best-effort sends drop
    pub backpressure_limit: usize,

    /// Idle time without any inbound frame before the connection is closed
    #[serde(with = "duration_serde")]
    pub connection_timeout: Duration,

    /// Timeout for graceful server shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,

    pub max_connections: usize,

    /// Largest inbound frame, header included
    pub max_frame_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:10100"),
            backpressure_limit: 256,
            connection_timeout: timeout::DEFAULT_TIMEOUT,
            shutdown_timeout: timeout::SHUTDOWN_TIMEOUT,
            max_connections: 1000,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Server address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid server address format: '{}' (expected format: '0.0.0.0:10100')",
                self.address
            ));
        }

        if self.backpressure_limit == 0 {
            errors.push("Backpressure limit must be greater than 0".to_string());
        } else if self.backpressure_limit > 1_000_000 {
            errors.push(format!(
                "Backpressure limit too large: {} (max recommended: 1,000,000)",
                self.backpressure_limit
            ));
        }

        if self.connection_timeout.as_millis() < 100 {
            errors.push("Connection timeout too short (minimum: 100ms)".to_string());
        } else if self.connection_timeout.as_secs() > 300 {
            errors.push("Connection timeout too long (maximum: 300s)".to_string());
        }

        if self.shutdown_timeout.as_secs() < 1 {
            errors.push("Shutdown timeout too short (minimum: 1s)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        if self.max_connections == 0 {
            errors.push("Max connections must be greater than 0".to_string());
        }

        if self.max_frame_size < crate::core::packet::HEADER_LEN {
            errors.push("Max frame size smaller than the frame header".to_string());
        } else if self.max_frame_size > u16::MAX as usize {
            errors.push(format!(
                "Max frame size too large: {} (frame length is a u16)",
                self.max_frame_size
            ));
        }

        errors
    }
}

/// A resolved `host:port` pair handed to clients in redirects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Parse `host:port`; the host may be a name or an IP literal
    pub fn parse(value: &str) -> Result<Self> {
        let (host, port) = value
            .rsplit_once(':')
            .ok_or_else(|| ProtocolError::ConfigError(format!("Missing port in '{value}'")))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(ProtocolError::ConfigError(format!("Missing host in '{value}'")));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| ProtocolError::ConfigError(format!("Invalid port in '{value}': {e}")))?;
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

/// Addresses of the other servers a client can be sent to
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClusterConfig {
    /// Game cluster (character select) address
    pub game_server: String,

    /// Authentication server (server select) address
    pub auth_server: String,

    /// Lifetime of an access key issued at logout
    #[serde(with = "duration_serde")]
    pub access_key_ttl: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            game_server: String::from("127.0.0.1:10000"),
            auth_server: String::from("127.0.0.1:10200"),
            access_key_ttl: Duration::from_secs(60),
        }
    }
}

impl ClusterConfig {
    pub fn game_endpoint(&self) -> Result<Endpoint> {
        Endpoint::parse(&self.game_server)
    }

    pub fn auth_endpoint(&self) -> Result<Endpoint> {
        Endpoint::parse(&self.auth_server)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if let Err(e) = self.game_endpoint() {
            errors.push(format!("Invalid game server address: {e}"));
        }
        if let Err(e) = self.auth_endpoint() {
            errors.push(format!("Invalid auth server address: {e}"));
        }
        if self.access_key_ttl.is_zero() {
            errors.push("Access key TTL must be greater than 0".to_string());
        }

        errors
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DistrictConfig {
    pub id: i32,
    pub name: String,
}

/// Game-world settings used by the dispatcher
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GameConfig {
    pub channel_id: u16,

    /// District used when a character's saved map is not hosted here
    pub default_district: i32,

    /// Map whose players-request is followed by the NPC blob
    pub npc_map_id: i32,

    /// Folder holding captured `skills.packet` / `npcs.packet` frames
    pub packets_folder: PathBuf,

    /// Log unhandled opcodes at info level
    pub log_packets: bool,

    /// Districts hosted by this process
    pub districts: Vec<DistrictConfig>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            channel_id: 1,
            default_district: 10003,
            npc_map_id: NPC_MAP_ID,
            packets_folder: PathBuf::from("packets"),
            log_packets: false,
            districts: vec![
                DistrictConfig {
                    id: 10003,
                    name: String::from("Candus City"),
                },
                DistrictConfig {
                    id: 10021,
                    name: String::from("Rocco Town"),
                },
            ],
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.districts.is_empty() {
            errors.push("At least one district must be configured".to_string());
        } else if !self.districts.iter().any(|d| d.id == self.default_district) {
            errors.push(format!(
                "Default district {} is not in the district list",
                self.default_district
            ));
        }

        let mut ids: Vec<i32> = self.districts.iter().map(|d| d.id).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.len() != self.districts.len() {
            errors.push("District ids must be unique".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("world-protocol"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
