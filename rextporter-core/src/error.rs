//! Error types for rextporter configuration handling

use thiserror::Error;

/// Options store errors.
///
/// Both variants are recoverable: callers are expected to branch on them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Key not found: {key}")]
    NotFound { key: String },

    #[error("Invalid type for key {key}: expected {expected}, found {found}")]
    InvalidType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Configuration loading errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Can not read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Can not decode the config data: {reason}")]
    Parse { reason: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Config validation failed: {}", issues.join("; "))]
    Validation { issues: Vec<String> },
}

/// Master error type for all rextporter configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RextError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for options store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for rextporter operations.
pub type RextResult<T> = Result<T, RextError>;

// =============================================================================
// TESTS
// =============================================================================
