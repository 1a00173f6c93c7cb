//! # Store Error Types
//!
//! Error types for storage, configuration and provider access.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Store Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │    Storage      │  │     Provider            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  InvalidKey     │  │  OutsideProvider        │ │
//! │  │  ConfigLoad...  │  │  StorageIo      │  │                         │ │
//! │  │  ConfigSave...  │  │  Serialization  │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  NOT IN THIS LIST: malformed durable cart JSON. That is recovered      │
//! │  inside the persistence bridge and never reaches a caller.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use bookcart_core::CoreError;
use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Store error type.
#[derive(Debug, Error)]
pub enum StoreError {
    // =========================================================================
    // Provider Errors
    // =========================================================================
    /// Cart state was requested with no active provider on this thread.
    #[error("use_cart_state must be used within a CartProvider")]
    OutsideProvider,

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// Storage key contains characters the backend cannot represent.
    #[error("Invalid storage key '{0}': only letters, digits, '.', '_' and '-' are allowed")]
    InvalidKey(String),

    /// Reading or writing the durable medium failed.
    #[error("Storage I/O failed: {0}")]
    StorageIo(String),

    /// Encoding a cart for storage failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration value.
    #[error("Invalid cart configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Domain Errors
    // =========================================================================
    /// Line item could not be built.
    #[error(transparent)]
    Core(#[from] CoreError),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::StorageIo(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for StoreError {
    fn from(err: toml::de::Error) -> Self {
        StoreError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for StoreError {
    fn from(err: toml::ser::Error) -> Self {
        StoreError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl StoreError {
    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidConfig(_)
                | StoreError::ConfigLoadFailed(_)
                | StoreError::ConfigSaveFailed(_)
        )
    }

    /// Returns true if this error came from the durable medium.
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidKey(_) | StoreError::StorageIo(_) | StoreError::Serialization(_)
        )
    }
}
