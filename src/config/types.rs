//! Core configuration types for uniconf

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::schema::ConfigHandle;
use crate::error::{Error, Result};
use crate::storage::{JsonStorage, StorageBackend};

/// Default quiet period before a watched change triggers a reload
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Configuration for initializing the [`ConfigRegistry`](crate::ConfigRegistry)
///
/// Resulting layout:
///
/// ```text
/// <config_dir>/<owner>/<config_file_stem>.<ext>
/// <config_dir>/<owner>/<files_dir_name>/<relative path>
/// ```
#[derive(Clone, Debug)]
pub struct RegistryConfig<S: StorageBackend = JsonStorage> {
    /// Root directory holding one sub-directory per owner
    pub config_dir: PathBuf,

    /// Application name (used for the default config dir)
    pub app_name: String,

    /// File stem of each owner's config file (default: "config")
    pub config_file_stem: String,

    /// Directory under each owner's dir holding tracked files (default: "files")
    pub files_dir_name: String,

    /// Storage backend implementation
    pub storage: S,

    /// Quiet period before watched changes are delivered
    pub debounce: Duration,
}

impl Default for RegistryConfig<JsonStorage> {
    fn default() -> Self {
        RegistryConfigBuilder::new("uniconf").build()
    }
}

impl<S: StorageBackend> RegistryConfig<S> {
    /// Directory holding everything that belongs to `owner`
    pub fn owner_dir(&self, owner: &str) -> PathBuf {
        self.config_dir.join(owner)
    }

    /// Full path of `owner`'s config file
    pub fn config_path(&self, owner: &str) -> PathBuf {
        self.owner_dir(owner).join(format!(
            "{}.{}",
            self.config_file_stem,
            self.storage.extension()
        ))
    }

    /// Directory holding `owner`'s tracked files
    pub fn files_dir(&self, owner: &str) -> PathBuf {
        self.owner_dir(owner).join(&self.files_dir_name)
    }

    /// Full path of a tracked file (`relative` must already be normalized)
    pub fn file_path(&self, owner: &str, relative: &Path) -> PathBuf {
        self.files_dir(owner).join(relative)
    }

    /// Check that names used as path components are usable
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file stem or files directory is not a
    /// single plain path component, or if both are equal.
    pub fn validate(&self) -> Result<()> {
        for (what, value) in [
            ("config file stem", &self.config_file_stem),
            ("files directory", &self.files_dir_name),
        ] {
            if !is_single_component(value) {
                return Err(Error::Config(format!(
                    "{what} '{value}' must be a single path component"
                )));
            }
        }
        if self.config_file_stem == self.files_dir_name {
            return Err(Error::Config(
                "config file stem and files directory must differ".into(),
            ));
        }
        Ok(())
    }
}

/// Whether `name` can be used as exactly one directory/file name
pub(crate) fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

impl RegistryConfig<JsonStorage> {
    /// Create a new builder for RegistryConfig
    ///
    /// # Example
    /// ```rust
    /// use uniconf::RegistryConfig;
    ///
    /// let config = RegistryConfig::builder("my-host")
    ///     .config_dir("~/.config/my-host")
    ///     .build();
    /// assert_eq!(config.config_file_stem, "config");
    /// ```
    pub fn builder(app_name: impl Into<String>) -> RegistryConfigBuilder {
        RegistryConfigBuilder::new(app_name)
    }
}

/// Builder for creating RegistryConfig with a fluent API
#[derive(Clone, Debug)]
pub struct RegistryConfigBuilder<S: StorageBackend = JsonStorage> {
    config_dir: Option<PathBuf>,
    app_name: String,
    config_file_stem: String,
    files_dir_name: String,
    storage: S,
    debounce: Duration,
}

impl RegistryConfigBuilder<JsonStorage> {
    /// Create a new builder with the required app name
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            config_dir: None,
            app_name: app_name.into(),
            config_file_stem: "config".into(),
            files_dir_name: "files".into(),
            storage: JsonStorage::new(),
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Use compact JSON (no pretty printing)
    pub fn compact_json(mut self) -> Self {
        self.storage = JsonStorage::compact();
        self
    }
}

impl<S: StorageBackend> RegistryConfigBuilder<S> {
    /// Set the root configuration directory
    ///
    /// Supports `~` expansion for home directory.
    pub fn config_dir(mut self, path: impl Into<PathBuf>) -> Self {
        let path: PathBuf = path.into();
        // Expand ~ to home directory
        let expanded = if path.starts_with("~") {
            if let Some(home) = dirs::home_dir() {
                home.join(path.strip_prefix("~").unwrap_or(&path))
            } else {
                path
            }
        } else {
            path
        };
        self.config_dir = Some(expanded);
        self
    }

    /// Set the file stem of every owner's config file (default: "config")
    pub fn config_file_stem(mut self, stem: impl Into<String>) -> Self {
        self.config_file_stem = stem.into();
        self
    }

    /// Set the per-owner directory holding tracked files (default: "files")
    pub fn files_dir(mut self, name: impl Into<String>) -> Self {
        self.files_dir_name = name.into();
        self
    }

    /// Set the watch debounce window (default: 300ms)
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Use a different storage backend
    pub fn storage<S2: StorageBackend>(self, storage: S2) -> RegistryConfigBuilder<S2> {
        RegistryConfigBuilder {
            config_dir: self.config_dir,
            app_name: self.app_name,
            config_file_stem: self.config_file_stem,
            files_dir_name: self.files_dir_name,
            storage,
            debounce: self.debounce,
        }
    }

    /// Build the RegistryConfig
    ///
    /// If `config_dir` is not set, uses the system config directory for the app.
    pub fn build(self) -> RegistryConfig<S> {
        let config_dir = self.config_dir.unwrap_or_else(|| {
            // Use system config dir if available, otherwise current dir
            dirs::config_dir()
                .map(|d| d.join(&self.app_name))
                .unwrap_or_else(|| PathBuf::from("."))
        });

        RegistryConfig {
            config_dir,
            app_name: self.app_name,
            config_file_stem: self.config_file_stem,
            files_dir_name: self.files_dir_name,
            storage: self.storage,
            debounce: self.debounce,
        }
    }
}

// =============================================================================
// Registration Options
// =============================================================================

/// Callback run after a config instance was reloaded from disk
pub type ReloadCallback<T> = Arc<dyn Fn(&ConfigHandle<T>) + Send + Sync>;

/// Options for [`ConfigRegistry::add_config`](crate::ConfigRegistry::add_config)
pub struct ConfigOptions<T> {
    pub(crate) init_now: bool,
    pub(crate) watch: bool,
    pub(crate) on_reload: Option<ReloadCallback<T>>,
}

impl<T> ConfigOptions<T> {
    /// No immediate load, no watching
    pub fn new() -> Self {
        Self {
            init_now: false,
            watch: false,
            on_reload: None,
        }
    }

    /// Load (or create with defaults) right away
    #[must_use]
    pub fn init_now(mut self, init_now: bool) -> Self {
        self.init_now = init_now;
        self
    }

    /// Reload automatically when the file changes on disk
    #[must_use]
    pub fn watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    /// Run `callback` with the new instance after every successful reload
    #[must_use]
    pub fn on_reload<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ConfigHandle<T>) + Send + Sync + 'static,
    {
        self.on_reload = Some(Arc::new(callback));
        self
    }
}

impl<T> Default for ConfigOptions<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ConfigOptions<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigOptions")
            .field("init_now", &self.init_now)
            .field("watch", &self.watch)
            .field("on_reload", &self.on_reload.as_ref().map(|_| "Some(Fn)"))
            .finish()
    }
}

/// Options for [`ConfigRegistry::add_file`](crate::ConfigRegistry::add_file)
#[derive(Debug, Clone, Copy, Default)]
pub struct FileOptions {
    pub(crate) watch: bool,
}

impl FileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refresh the cached content when the file changes on disk
    #[must_use]
    pub fn watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }
}
