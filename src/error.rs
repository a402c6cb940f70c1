//! Error types.
//!
//! Only manager-level failures reach callers. Adapter and transport errors
//! are absorbed by the strategies that own them and reported via `tracing`.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by [`StateManager`](crate::StateManager).
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Store '{key}' already exists with a different value type (requested {requested})")]
    TypeMismatch {
        key: String,
        requested: &'static str,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {source}")]
    ParseError {
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// Errors raised by a [`PersistenceAdapter`](crate::persistence::PersistenceAdapter).
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode value for '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Persistence backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by a [`SyncChannel`](crate::sync::SyncChannel).
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Channel '{name}' is closed")]
    Closed { name: String },

    #[error("Failed to encode payload for channel '{name}': {source}")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}
