//! Unified error types for alertflow
//!
//! This module defines all error types used throughout the application.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from the queue backend
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Error from configuration parsing/validation
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error from domain type validation
    #[error("Domain validation error: {0}")]
    Domain(#[from] DomainError),

    /// Error from the state store
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Error from a delivery channel
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from domain type validation and routing index mutations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Tag name does not match the identifier format
    #[error("Invalid tag name '{0}' (allowed: letters, digits, '-', '_', '.', '|')")]
    InvalidTagName(String),

    /// Tags cannot be renamed once created
    #[error("Tag '{id}' cannot be renamed to '{requested}'")]
    TagRenameRejected { id: String, requested: String },

    /// Tag already exists
    #[error("Tag already exists: {0}")]
    DuplicateTag(String),

    /// Tag not found
    #[error("Unknown tag: {0}")]
    UnknownTag(String),

    /// Rule not found
    #[error("Unknown rule: {0}")]
    UnknownRule(String),

    /// Check not found
    #[error("Unknown check: {0}")]
    UnknownCheck(String),

    /// Rule must deliver somewhere
    #[error("Rule '{0}' has no channels")]
    EmptyRuleChannels(String),

    /// Invalid check state string
    #[error("Invalid check state: {0}")]
    InvalidState(String),

    /// Invalid value provided
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Maintenance window ends before it starts
    #[error("Invalid maintenance window: {0}")]
    InvalidMaintenanceWindow(String),
}

/// Errors from configuration parsing and validation
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// Config file exists but could not be read
    #[error("Failed to read {path}: {source}")]
    ReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse config file
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid config value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Missing required config field
    #[error("Missing required configuration field: {0}")]
    MissingField(String),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Errors from queue backends
#[derive(Error, Debug)]
pub enum QueueError {
    /// No backend registered for the configured type
    #[error("Unknown queue backend type: {0}")]
    UnknownBackend(String),

    /// Backend failed to initialize
    #[error("Failed to initialize {backend} queue backend: {message}")]
    InitializationFailed { backend: String, message: String },

    /// Result payload could not be decoded
    #[error("Failed to decode result: {0}")]
    Decode(String),

    /// Backend has been closed and no further results will arrive
    #[error("Queue closed: {0}")]
    Closed(String),

    /// IO error talking to the backend
    #[error("Queue IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the state store
#[derive(Error, Debug)]
pub enum StoreError {
    /// IO error reading or writing the store
    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot (de)serialization failed
    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Store lock was poisoned by a panicking writer
    #[error("Store is unavailable: {0}")]
    Unavailable(String),
}

/// Errors from delivery channels
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// The handler failed to deliver the payload
    #[error("{kind} delivery to {address} failed: {message}")]
    Failed {
        kind: String,
        address: String,
        message: String,
    },

    /// Background worker for the channel type is gone
    #[error("Delivery worker for '{0}' is not running")]
    WorkerGone(String),

    /// IO error writing the notification
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Classify a failed read of a configuration file
    pub fn from_read(path: &std::path::Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound(path.display().to_string())
        } else {
            Self::ReadError {
                path: path.display().to_string(),
                source: err,
            }
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
