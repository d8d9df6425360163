//! # Sync Configuration
//!
//! Configuration for the NetworkReconciler and its remote authority.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     STOCKBOOK_SYNC_MODE=offline                                        │
//! │     STOCKBOOK_DEVICE_ID=abc-123                                        │
//! │     STOCKBOOK_REMOTE_URL=wss://sync.example.com/push                   │
//! │     STOCKBOOK_PUSH_TIMEOUT_SECS=30                                     │
//! │     STOCKBOOK_POLL_INTERVAL_SECS=60                                    │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/stockbook/sync.toml (Linux)                              │
//! │     ~/Library/Application Support/com.stockbook.stockbook/sync.toml    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     SyncMode::Online, simulated remote, auto-generated device_id       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Mostrador"
//!
//! [sync]
//! mode = "online"            # online | offline
//! remote_url = "wss://sync.example.com/push"   # omit for the simulated remote
//! push_timeout_secs = 30
//! poll_interval_secs = 60
//! simulated_round_trip_ms = 1500
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Sync Mode
// =============================================================================

/// Whether this device pushes pending changes at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Push whenever connectivity allows.
    #[default]
    Online,

    /// Sync disabled. Changes stay pending locally.
    Offline,
}

impl SyncMode {
    pub fn is_sync_enabled(&self) -> bool {
        matches!(self, SyncMode::Online)
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::Online => write!(f, "online"),
            SyncMode::Offline => write!(f, "offline"),
        }
    }
}

impl std::str::FromStr for SyncMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "online" | "auto" | "enabled" => Ok(SyncMode::Online),
            "offline" | "disabled" => Ok(SyncMode::Offline),
            other => Err(SyncError::InvalidConfig(format!(
                "Unknown sync mode: '{}'. Valid options: online, offline",
                other
            ))),
        }
    }
}

// =============================================================================
// Device Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device identifier, sent with every push.
    /// Auto-generated on first run if not provided.
    pub id: String,

    /// Human-readable device name (e.g., "Mostrador", "Bodega").
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn default_device_name() -> String {
    "Stockbook".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: Uuid::new_v4().to_string(),
            name: default_device_name(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default)]
    pub mode: SyncMode,

    /// WebSocket URL of the remote authority. `None` selects the simulated
    /// remote.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Upper bound for one push round trip (seconds). Expiry counts as a
    /// failed sync.
    #[serde(default = "default_push_timeout")]
    pub push_timeout_secs: u64,

    /// Interval between background sync attempts while online (seconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Latency of the simulated remote (milliseconds).
    #[serde(default = "default_simulated_round_trip")]
    pub simulated_round_trip_ms: u64,
}

fn default_push_timeout() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    60
}
fn default_simulated_round_trip() -> u64 {
    1500
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            mode: SyncMode::default(),
            remote_url: None,
            push_timeout_secs: default_push_timeout(),
            poll_interval_secs: default_poll_interval(),
            simulated_round_trip_ms: default_simulated_round_trip(),
        }
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub sync: SyncSettings,
}

impl SyncConfig {
    /// Creates a new config with defaults and a generated device ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.device.id.is_empty() {
            return Err(SyncError::MissingDeviceId);
        }

        if let Some(ref raw) = self.sync.remote_url {
            let parsed = url::Url::parse(raw)
                .map_err(|e| SyncError::InvalidUrl(format!("{}: {}", raw, e)))?;
            if !matches!(parsed.scheme(), "ws" | "wss") {
                return Err(SyncError::InvalidUrl(format!(
                    "Remote URL must start with ws:// or wss://, got: {}",
                    raw
                )));
            }
        }

        if self.sync.push_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "push_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.sync.poll_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "poll_interval_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `STOCKBOOK_*` overrides read through `lookup`.
    ///
    /// Unparseable numeric or mode values are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup("STOCKBOOK_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.device.id = id;
        }

        if let Some(mode) = lookup("STOCKBOOK_SYNC_MODE") {
            match mode.parse() {
                Ok(parsed) => {
                    debug!(mode = %mode, "Overriding sync mode from environment");
                    self.sync.mode = parsed;
                }
                Err(_) => warn!(mode = %mode, "Unknown sync mode in environment"),
            }
        }

        if let Some(url) = lookup("STOCKBOOK_REMOTE_URL") {
            debug!(url = %url, "Overriding remote URL from environment");
            self.sync.remote_url = if url.is_empty() { None } else { Some(url) };
        }

        if let Some(secs) = lookup("STOCKBOOK_PUSH_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.sync.push_timeout_secs = s,
                Err(_) => warn!(value = %secs, "Invalid STOCKBOOK_PUSH_TIMEOUT_SECS"),
            }
        }

        if let Some(secs) = lookup("STOCKBOOK_POLL_INTERVAL_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.sync.poll_interval_secs = s,
                Err(_) => warn!(value = %secs, "Invalid STOCKBOOK_POLL_INTERVAL_SECS"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "stockbook", "stockbook")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn device_id(&self) -> &str {
        &self.device.id
    }

    pub fn mode(&self) -> SyncMode {
        self.sync.mode
    }

    pub fn is_sync_enabled(&self) -> bool {
        self.sync.mode.is_sync_enabled()
    }

    pub fn remote_url(&self) -> Option<&str> {
        self.sync.remote_url.as_deref()
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.push_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.sync.poll_interval_secs)
    }

    pub fn simulated_round_trip(&self) -> Duration {
        Duration::from_millis(self.sync.simulated_round_trip_ms)
    }
}
