use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

fn default_namespace() -> String {
    "statemesh".to_string()
}

/// Which strategies a [`StateManager`](super::StateManager) wires onto the
/// stores it creates.
///
/// ```toml
/// persistence = true
/// sync = false
/// namespace = "todo-app"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateConfig {
    /// Restore stores from and save them to the persistence adapter.
    #[serde(default)]
    pub persistence: bool,
    /// Mirror stores over the sync transport.
    #[serde(default)]
    pub sync: bool,
    /// Prefix for storage keys and channel names.
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            persistence: false,
            sync: false,
            namespace: default_namespace(),
        }
    }
}

impl StateConfig {
    /// Enable or disable the persistence strategy.
    pub fn with_persistence(mut self, enabled: bool) -> Self {
        self.persistence = enabled;
        self
    }

    /// Enable or disable the sync strategy.
    pub fn with_sync(mut self, enabled: bool) -> Self {
        self.sync = enabled;
        self
    }

    /// Prefix for persisted keys and sync channel names.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: StateConfig =
            toml::from_str(content).map_err(|source| ConfigError::ParseError { source })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// A missing file yields `StateConfig::default()`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Validates the configuration.
    ///
    /// The namespace must be non-empty and must not contain `:`, which
    /// separates it from the store key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.is_empty() {
            return Err(ConfigError::ValidationError {
                message: "namespace must not be empty".to_string(),
            });
        }
        if self.namespace.contains(':') {
            return Err(ConfigError::ValidationError {
                message: format!("namespace '{}' must not contain ':'", self.namespace),
            });
        }
        Ok(())
    }

    /// Storage key and channel name for a store key.
    pub fn qualify(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }
}
