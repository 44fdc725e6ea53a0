//! Builder for ConfigRegistry
//!
//! This module contains [`RegistryBuilder`] which provides a fluent API
//! for creating a [`ConfigRegistry`](super::ConfigRegistry).

use crate::config::RegistryConfigBuilder;
use crate::error::Result;
use crate::storage::{JsonStorage, StorageBackend};
use std::path::PathBuf;
use std::time::Duration;

use super::ConfigRegistry;

/// Builder for creating a [`ConfigRegistry`] with a fluent API.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use uniconf::ConfigRegistry;
///
/// let registry = ConfigRegistry::builder("my-host")
///     .config_dir("~/.config/my-host")
///     .config_file_stem("settings")
///     .debounce(Duration::from_millis(200))
///     .build()
///     .unwrap();
/// ```
pub struct RegistryBuilder<S: StorageBackend = JsonStorage> {
    config_builder: RegistryConfigBuilder<S>,
}

impl RegistryBuilder<JsonStorage> {
    /// Create a new builder with the required app name.
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            config_builder: RegistryConfigBuilder::new(app_name),
        }
    }

    /// Use compact JSON (no pretty printing).
    pub fn compact_json(mut self) -> Self {
        self.config_builder = self.config_builder.compact_json();
        self
    }
}

impl<S: StorageBackend> RegistryBuilder<S> {
    /// Set the root configuration directory.
    ///
    /// Supports `~` expansion for home directory.
    pub fn config_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_builder = self.config_builder.config_dir(path);
        self
    }

    /// Set the file stem of every owner's config file (default: "config").
    pub fn config_file_stem(mut self, stem: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.config_file_stem(stem);
        self
    }

    /// Set the per-owner directory for tracked files (default: "files").
    pub fn files_dir(mut self, name: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.files_dir(name);
        self
    }

    /// Set how long a burst of file events must be quiet before a watched
    /// config or file is reloaded.
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.config_builder = self.config_builder.debounce(debounce);
        self
    }

    /// Use a different storage backend.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use uniconf::{ConfigRegistry, TomlStorage};
    ///
    /// let registry = ConfigRegistry::builder("my-host")
    ///     .storage(TomlStorage::new())
    ///     .build()?;
    /// ```
    pub fn storage<S2: StorageBackend>(self, storage: S2) -> RegistryBuilder<S2> {
        RegistryBuilder {
            config_builder: self.config_builder.storage(storage),
        }
    }

    /// Build the ConfigRegistry.
    ///
    /// # Errors
    ///
    /// Returns an error if the file stem or files directory is not a plain
    /// single path component.
    pub fn build(self) -> Result<ConfigRegistry<S>> {
        ConfigRegistry::new(self.config_builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_applies_settings() {
        let temp = tempfile::tempdir().unwrap();
        let registry = RegistryBuilder::new("app")
            .config_dir(temp.path())
            .config_file_stem("settings")
            .files_dir("assets")
            .debounce(Duration::from_millis(50))
            .compact_json()
            .build()
            .unwrap();

        let config = registry.config();
        assert_eq!(config.config_dir, temp.path());
        assert_eq!(
            registry.config_path("plugin"),
            temp.path().join("plugin").join("settings.json")
        );
        assert_eq!(config.files_dir("plugin"), temp.path().join("plugin/assets"));
        assert_eq!(config.debounce, Duration::from_millis(50));
    }

    #[test]
    fn test_builder_rejects_nested_stem() {
        let result = RegistryBuilder::new("app")
            .config_file_stem("nested/config")
            .build();
        assert!(result.is_err());
    }
}
