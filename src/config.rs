//! Configuration management for ipc-sim.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::ServerConfig;
use crate::channel::{ChannelOptions, DEFAULT_SHM_CAPACITY, MAX_READ_TIMEOUT};
use crate::cli::Args;

/// Well-known System V key for the server's shared-memory segment ("IPC").
pub const DEFAULT_SHM_KEY: i32 = 0x0049_5043;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerSection,
    /// IPC channel configuration.
    pub ipc: IpcSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Enable graceful shutdown.
    pub graceful_shutdown: bool,
    /// Budget for one simulate request, in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            graceful_shutdown: true,
            request_timeout_ms: 10_000,
        }
    }
}

/// IPC channel section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcSection {
    /// Shared-memory payload capacity in bytes.
    pub shm_capacity: usize,
    /// System V key of the shared-memory segment. `null` for a private one.
    pub shm_key: Option<i32>,
    /// Remove a segment left under `shm_key` by a previous run.
    pub reclaim_stale: bool,
    /// Pipe read timeout in milliseconds (capped at 5000).
    pub read_timeout_ms: u64,
}

impl Default for IpcSection {
    fn default() -> Self {
        Self {
            shm_capacity: DEFAULT_SHM_CAPACITY,
            shm_key: Some(DEFAULT_SHM_KEY),
            reclaim_stale: true,
            read_timeout_ms: MAX_READ_TIMEOUT.as_millis() as u64,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Parse a System V key given in decimal or `0x` hexadecimal.
///
/// Hex keys cover the full 32-bit range (`ftok` keys often have the high bit
/// set). `0` is `IPC_PRIVATE` and is not a usable key.
pub fn parse_shm_key(value: &str) -> Option<i32> {
    let value = value.trim();
    let key = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()? as i32,
        None => value
            .parse::<i32>()
            .ok()
            .or_else(|| value.parse::<u32>().ok().map(|k| k as i32))?,
    };
    (key != libc::IPC_PRIVATE).then_some(key)
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("IPC_SIM_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("IPC_SIM_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }

        if let Ok(key) = std::env::var("IPC_SIM_SHM_KEY") {
            if let Some(key) = parse_shm_key(&key) {
                self.ipc.shm_key = Some(key);
            }
        }

        if let Ok(ms) = std::env::var("IPC_SIM_READ_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                self.ipc.read_timeout_ms = ms;
            }
        }

        if let Ok(level) = std::env::var("IPC_SIM_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = args.host {
            self.server.host = host.to_string();
        }

        if let Some(port) = args.port {
            self.server.port = port;
        }

        if let Some(capacity) = args.shm_capacity {
            self.ipc.shm_capacity = capacity;
        }

        if let Some(key) = args.shm_key {
            self.ipc.shm_key = Some(key);
        }

        if args.no_reclaim {
            self.ipc.reclaim_stale = false;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        config.apply_env();
        config.apply_args(args);

        Ok(config)
    }

    /// Channel allocation parameters.
    pub fn channel_options(&self) -> ChannelOptions {
        ChannelOptions::default()
            .with_shm_capacity(self.ipc.shm_capacity)
            .with_shm_key(self.ipc.shm_key)
            .with_read_timeout(Duration::from_millis(self.ipc.read_timeout_ms))
    }

    /// Convert to ServerConfig for the API server.
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigError> {
        let host: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.server.host.clone()))?;

        if self.ipc.shm_capacity == 0 || self.ipc.shm_capacity > u32::MAX as usize {
            return Err(ConfigError::InvalidValue(
                "ipc.shm_capacity",
                self.ipc.shm_capacity.to_string(),
            ));
        }

        if self.ipc.read_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "ipc.read_timeout_ms",
                "0".to_string(),
            ));
        }

        if self.ipc.shm_key == Some(libc::IPC_PRIVATE) {
            return Err(ConfigError::InvalidValue("ipc.shm_key", "0".to_string()));
        }

        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "server.request_timeout_ms",
                "0".to_string(),
            ));
        }

        let mut server_config = ServerConfig::new(host.to_string(), self.server.port)
            .with_channel(self.channel_options())
            .with_request_timeout(Duration::from_millis(self.server.request_timeout_ms));

        if !self.ipc.reclaim_stale {
            server_config = server_config.without_reclaim();
        }

        if !self.server.graceful_shutdown {
            server_config = server_config.without_graceful_shutdown();
        }

        Ok(server_config)
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Invalid host address.
    InvalidHost(String),
    /// Out-of-range setting.
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidHost(host) => write!(f, "invalid host address: {}", host),
            Self::InvalidValue(name, value) => write!(f, "invalid value for {}: {}", name, value),
        }
    }
}

impl std::error::Error for ConfigError {}
