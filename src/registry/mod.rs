//! Main config registry module
//!
//! This module contains the [`ConfigRegistry`] struct which is the primary entry
//! point for registering, loading, saving and watching per-owner configs.

mod builder;
mod configs;
mod entry;
mod files;
mod global;
mod locks;

pub use builder::RegistryBuilder;

use crate::cache::FileCache;
use crate::config::{RegistryConfig, SchemaId, is_single_component};
use crate::error::{Error, Result};
use crate::events::EventManager;
use crate::storage::{JsonStorage, StorageBackend};
use crate::sync::RwLockExt;
use crate::watcher::WatchCallback;
use entry::{ConfigEntry, TrackedFile};
use locks::OwnerLocks;

use log::{error, info};
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Process-wide registry of per-owner configs and tracked files.
///
/// The `ConfigRegistry` maps every owner (a module or plugin name) to:
///
/// - **Schema**: the registered config type, at most one owner per type
/// - **Instance**: the live, shared config value handed out as [`ConfigHandle`](crate::ConfigHandle)
/// - **File**: `<config_dir>/<owner>/config.<ext>`, written atomically
/// - **Watch**: an optional subscription that reloads the instance on external edits
/// - **Tracked files**: arbitrary text files cached in memory
///
/// Cloning is cheap; all clones share the same state. Pass the registry to
/// consumers explicitly and reach for [`ConfigRegistry::global`] only at the
/// host's outermost layer.
///
/// # Example
///
/// ```rust,no_run
/// use serde::{Deserialize, Serialize};
/// use uniconf::{ConfigOptions, ConfigRegistry};
///
/// #[derive(Debug, Default, Clone, Serialize, Deserialize)]
/// struct GreeterConfig {
///     greeting: String,
/// }
///
/// # async fn run() -> uniconf::Result<()> {
/// let registry = ConfigRegistry::builder("my-host")
///     .config_dir("/tmp/my-host")
///     .build()?;
///
/// registry
///     .add_config::<GreeterConfig>("greeter", ConfigOptions::new().init_now(true))
///     .await?;
///
/// let config = registry.get_config::<GreeterConfig>("greeter")?;
/// config.write().greeting = "hi".into();
/// registry.save_config("greeter").await?;
/// # Ok(())
/// # }
/// ```
pub struct ConfigRegistry<S: StorageBackend = JsonStorage> {
    pub(crate) inner: Arc<RegistryInner<S>>,
}

pub(crate) struct RegistryInner<S: StorageBackend> {
    /// Configuration
    config: RegistryConfig<S>,

    /// Registered configs by owner
    entries: RwLock<HashMap<String, ConfigEntry<S>>>,

    /// Schema type -> owner
    class_index: RwLock<HashMap<SchemaId, String>>,

    /// Tracked files by owner, keyed by normalized relative path
    files: RwLock<HashMap<String, HashMap<PathBuf, TrackedFile>>>,

    /// Tracked file contents
    cache: FileCache,

    /// Per-owner exclusive locks for file I/O
    locks: OwnerLocks,

    /// Event manager for change callbacks and background failures
    events: EventManager,
}

impl ConfigRegistry {
    /// Create a builder for `ConfigRegistry` with a fluent API.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use uniconf::ConfigRegistry;
    ///
    /// let registry = ConfigRegistry::builder("my-host")
    ///     .config_dir("~/.config/my-host")
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn builder(app_name: impl Into<String>) -> RegistryBuilder {
        RegistryBuilder::new(app_name)
    }
}

impl<S: StorageBackend> ConfigRegistry<S> {
    /// Create a new registry with the given configuration.
    ///
    /// Nothing is written to disk until the first config or file is persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails [`RegistryConfig::validate`].
    pub fn new(config: RegistryConfig<S>) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    pub(crate) fn from_validated(config: RegistryConfig<S>) -> Self {
        info!(
            "Initialized uniconf ConfigRegistry at: {}",
            config.config_dir.display()
        );

        Self {
            inner: Arc::new(RegistryInner {
                config,
                entries: RwLock::new(HashMap::new()),
                class_index: RwLock::new(HashMap::new()),
                files: RwLock::new(HashMap::new()),
                cache: FileCache::new(),
                locks: OwnerLocks::new(),
                events: EventManager::new(),
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &RegistryConfig<S> {
        &self.inner.config
    }

    /// Get the storage backend
    pub fn storage(&self) -> &S {
        &self.inner.config.storage
    }

    /// Get the event manager for registering change and failure listeners
    ///
    /// # Example
    ///
    /// ```
    /// # let temp = tempfile::tempdir().unwrap();
    /// # let registry = uniconf::ConfigRegistry::builder("test")
    /// #     .config_dir(temp.path())
    /// #     .build()
    /// #     .unwrap();
    /// registry.events().on_change(|event| {
    ///     println!("{} changed: {:?}", event.owner(), event);
    /// });
    ///
    /// registry.events().on_failure(|owner, error| {
    ///     eprintln!("background reload of {owner} failed: {error}");
    /// });
    /// ```
    pub fn events(&self) -> &EventManager {
        &self.inner.events
    }

    /// Drop every config, tracked file and watch subscription.
    ///
    /// Event listeners stay registered.
    pub fn clear(&self) {
        let entries = std::mem::take(&mut *self.inner.entries.write_recovered());
        let files = std::mem::take(&mut *self.inner.files.write_recovered());
        self.inner.class_index.write_recovered().clear();
        self.inner.cache.clear();

        info!(
            "Cleared {} config(s) and tracked files of {} owner(s)",
            entries.len(),
            files.len()
        );
        // Subscriptions stop here
        drop(entries);
        drop(files);
    }

    /// Build a watch callback that runs `f` against this registry, as long as
    /// the registry is still alive.
    fn watch_callback<F, Fut>(&self, owner: &str, f: F) -> WatchCallback
    where
        F: Fn(ConfigRegistry<S>, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let weak = Arc::downgrade(&self.inner);
        let owner = owner.to_string();
        let f = Arc::new(f);

        Arc::new(move || {
            let weak = weak.clone();
            let owner = owner.clone();
            let f = Arc::clone(&f);
            Box::pin(async move {
                if let Some(inner) = weak.upgrade() {
                    f(ConfigRegistry { inner }, owner).await;
                }
            })
        })
    }

    /// Log and publish a failure that has no caller to return to
    fn report_background_failure(&self, owner: &str, err: &Error) {
        error!("Background reload for '{owner}' failed: {err}");
        self.inner.events.notify_failure(owner, err);
    }
}

impl<S: StorageBackend> Clone for ConfigRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: StorageBackend> std::fmt::Debug for ConfigRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigRegistry")
            .field("config_dir", &self.inner.config.config_dir)
            .field("configs", &self.inner.entries.read_recovered().len())
            .field("file_owners", &self.inner.files.read_recovered().len())
            .finish()
    }
}

/// Owners become directory names
fn check_owner(owner: &str) -> Result<()> {
    if is_single_component(owner) {
        Ok(())
    } else {
        Err(Error::InvalidOwner(owner.to_string()))
    }
}
