//! # Cart Configuration
//!
//! Where the cart lives and how contexts notice each other's writes.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BOOKCART_STORAGE_KEY=shopping-cart                                 │
//! │     BOOKCART_BACKEND=file                                              │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/bookcart/cart.toml (Linux)                               │
//! │     ~/Library/Application Support/com.bookcart.bookcart/cart.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     in-memory backend, key "shopping-cart"                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # cart.toml
//! [storage]
//! key = "shopping-cart"
//! backend = "file"      # memory | file
//! data_dir = "/var/lib/bookcart"
//!
//! [sync]
//! enabled = true
//! watch_interval_ms = 250
//! event_capacity = 64
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::storage::{validate_key, DEFAULT_EVENT_CAPACITY};
use crate::CART_STORAGE_KEY;

const CONFIG_FILE: &str = "cart.toml";

// =============================================================================
// Storage Backend
// =============================================================================

/// Which durable medium backs the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// In-process only. Survives nothing but is shared by contexts of one
    /// process.
    #[default]
    Memory,

    /// One JSON file per key in a data directory, shared across processes.
    File,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::File => write!(f, "file"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "mem" => Ok(StorageBackend::Memory),
            "file" | "fs" => Ok(StorageBackend::File),
            other => Err(StoreError::InvalidConfig(format!(
                "Unknown storage backend: '{}'. Valid options: memory, file",
                other
            ))),
        }
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

/// Durable storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Key the cart is stored under.
    #[serde(default = "default_key")]
    pub key: String,

    /// Storage medium.
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory for the file backend. Falls back to the platform data dir.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_key() -> String {
    CART_STORAGE_KEY.to_string()
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            key: default_key(),
            backend: StorageBackend::default(),
            data_dir: None,
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Cross-context synchronization settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Follow writes made by other contexts. When off the cart still
    /// persists but never re-syncs.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// How often the file backend polls for foreign writes (milliseconds).
    #[serde(default = "default_watch_interval")]
    pub watch_interval_ms: u64,

    /// Notifications buffered per subscriber before it lags.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_true() -> bool {
    true
}

fn default_watch_interval() -> u64 {
    250
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            enabled: true,
            watch_interval_ms: default_watch_interval(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl SyncSettings {
    /// Poll interval as a `Duration`.
    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms)
    }
}

// =============================================================================
// Main Cart Configuration
// =============================================================================

/// Complete cart configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartConfig {
    /// Durable storage settings.
    #[serde(default)]
    pub storage: StorageSettings,

    /// Cross-context sync settings.
    #[serde(default)]
    pub sync: SyncSettings,
}

impl CartConfig {
    /// Creates a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (cart.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> StoreResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading cart config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| StoreError::ConfigLoadFailed(e.to_string()))?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load cart config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> StoreResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| StoreError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| StoreError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Cart config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> StoreResult<()> {
        validate_key(&self.storage.key).map_err(|_| {
            StoreError::InvalidConfig(format!(
                "storage.key '{}' must be non-empty and use only letters, digits, '.', '_' and '-'",
                self.storage.key
            ))
        })?;

        if self.sync.watch_interval_ms == 0 {
            return Err(StoreError::InvalidConfig(
                "watch_interval_ms must be greater than 0".into(),
            ));
        }

        if self.sync.event_capacity == 0 {
            return Err(StoreError::InvalidConfig(
                "event_capacity must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("BOOKCART_STORAGE_KEY") {
            debug!(key = %key, "Overriding storage key from environment");
            self.storage.key = key;
        }

        if let Ok(backend) = std::env::var("BOOKCART_BACKEND") {
            match backend.parse() {
                Ok(parsed) => {
                    debug!(backend = %backend, "Overriding storage backend from environment");
                    self.storage.backend = parsed;
                }
                Err(_) => warn!(backend = %backend, "Unknown storage backend in environment"),
            }
        }

        if let Ok(dir) = std::env::var("BOOKCART_DATA_DIR") {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }

        if let Ok(interval) = std::env::var("BOOKCART_WATCH_INTERVAL_MS") {
            match interval.parse::<u64>() {
                Ok(ms) => self.sync.watch_interval_ms = ms,
                Err(_) => warn!(value = %interval, "Invalid BOOKCART_WATCH_INTERVAL_MS value"),
            }
        }

        if let Ok(enabled) = std::env::var("BOOKCART_SYNC_ENABLED") {
            match enabled.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.sync.enabled = true,
                "0" | "false" | "no" | "off" => self.sync.enabled = false,
                _ => warn!(value = %enabled, "Unknown BOOKCART_SYNC_ENABLED value"),
            }
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "bookcart", "bookcart")
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Directory used by the file backend.
    pub fn resolved_data_dir(&self) -> StoreResult<PathBuf> {
        if let Some(dir) = &self.storage.data_dir {
            return Ok(dir.clone());
        }
        Self::project_dirs()
            .map(|dirs| dirs.data_dir().join("storage"))
            .ok_or_else(|| {
                StoreError::InvalidConfig("No data_dir configured and no home directory".into())
            })
    }

    /// Returns the storage key.
    pub fn key(&self) -> &str {
        &self.storage.key
    }
}
