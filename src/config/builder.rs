//! Configuration builder
//!
//! Merges configuration from files and CLI arguments.

use crate::config::{Config, ConfigFile};
use crate::error::ConfigError;
use crate::notify::DispatchMode;
use std::path::PathBuf;

/// Builder for merging configuration sources
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Load configuration from a file, or from the default locations
    ///
    /// An explicitly named file must exist; a default location is optional.
    pub fn with_file(mut self, path: Option<&str>) -> Result<Self, ConfigError> {
        let file_config = match path {
            Some(path) => Some(ConfigFile::load(path)?),
            None => ConfigFile::load_default()?,
        };

        if let Some(cfg) = file_config {
            self.config = cfg;
        }

        Ok(self)
    }

    /// Start from an already parsed configuration
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Override the queue backend type
    pub fn with_queue_type(mut self, backend: Option<String>) -> Self {
        if let Some(b) = backend {
            self.config.queue.backend = b;
        }
        self
    }

    /// Override the queue name
    pub fn with_queue_name(mut self, name: Option<String>) -> Self {
        if let Some(n) = name {
            self.config.queue.queue_name = n;
        }
        self
    }

    /// Override the spool path of a directory queue
    pub fn with_spool(mut self, spool: Option<PathBuf>) -> Self {
        if let Some(s) = spool {
            self.config.queue.options.insert(
                "path".to_string(),
                toml::Value::String(s.display().to_string()),
            );
        }
        self
    }

    /// Override the state store path
    pub fn with_store_path(mut self, path: Option<PathBuf>) -> Self {
        if let Some(p) = path {
            self.config.store.path = Some(p);
        }
        self
    }

    /// Force inline dispatch
    pub fn with_inline_dispatch(mut self, inline: bool) -> Self {
        if inline {
            self.config.general.dispatch = DispatchMode::Inline;
        }
        self
    }

    /// Build the final configuration
    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = ConfigBuilder::new().build();
        assert_eq!(config.queue.backend, "directory");
        assert_eq!(config.general.dispatch, DispatchMode::Background);
    }

    #[test]
    fn test_builder_overrides() {
        let config = ConfigBuilder::new()
            .with_queue_type(Some("memory".to_string()))
            .with_queue_name(Some("events".to_string()))
            .with_store_path(Some(PathBuf::from("/tmp/state.json")))
            .with_inline_dispatch(true)
            .build();

        assert_eq!(config.queue.backend, "memory");
        assert_eq!(config.queue.queue_name, "events");
        assert_eq!(config.store.path, Some(PathBuf::from("/tmp/state.json")));
        assert_eq!(config.general.dispatch, DispatchMode::Inline);
    }

    #[test]
    fn test_builder_spool_option() {
        let config = ConfigBuilder::new()
            .with_spool(Some(PathBuf::from("/var/spool/alertflow")))
            .build();

        assert_eq!(
            config.queue.options.get("path").and_then(|v| v.as_str()),
            Some("/var/spool/alertflow")
        );
    }

    #[test]
    fn test_builder_missing_explicit_file() {
        let result = ConfigBuilder::new().with_file(Some("/nonexistent/alertflow.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }
}
