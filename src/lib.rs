//! # uniconf - per-owner configuration registry
//!
//! A process-wide registry that lets independent modules and plugins ("owners")
//! keep their typed configuration and auxiliary files on disk, without knowing
//! where or how they are stored.
//!
//! ## Features
//!
//! - **Typed configs**: any `Serialize + Deserialize + Default` struct is a schema
//! - **Stable handles**: every caller gets the same live instance until it is reloaded or replaced
//! - **Atomic persistence**: temp file + rename, per-owner locking
//! - **Hot reload**: optional watch subscriptions reload configs and tracked files on external edits
//! - **Tracked files**: arbitrary text files cached in memory per owner
//! - **Pluggable formats**: JSON by default, TOML and YAML behind features
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serde::{Deserialize, Serialize};
//! use uniconf::{ConfigOptions, ConfigRegistry};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct PluginConfig {
//!     option1: String,
//!     option2: u32,
//! }
//!
//! impl Default for PluginConfig {
//!     fn default() -> Self {
//!         Self {
//!             option1: "default_value".into(),
//!             option2: 42,
//!         }
//!     }
//! }
//!
//! # async fn run() -> uniconf::Result<()> {
//! let registry = ConfigRegistry::builder("my-host")
//!     .config_dir("~/.config/my-host")
//!     .build()?;
//!
//! // Loads <config_dir>/my_plugin/config.json, creating it from defaults if needed
//! registry
//!     .add_config::<PluginConfig>("my_plugin", ConfigOptions::new().init_now(true).watch(true))
//!     .await?;
//!
//! let config = registry.get_config::<PluginConfig>("my_plugin")?;
//! config.write().option2 = 7;
//! registry.save_config("my_plugin").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Tracked Files
//!
//! ```rust,no_run
//! use uniconf::{ConfigRegistry, FileOptions};
//!
//! # async fn run(registry: ConfigRegistry) -> uniconf::Result<()> {
//! registry
//!     .add_file("my_plugin", "templates/greeting.txt", "Hello!", FileOptions::new().watch(true))
//!     .await?;
//!
//! let text = registry.get_cached_file_by_path("my_plugin", "templates/greeting.txt")?;
//! assert_eq!(&*text, "Hello!");
//! # Ok(())
//! # }
//! ```
//!
//! ## Storage Formats
//!
//! - JSON (default) via [`JsonStorage`]
//! - TOML via `TomlStorage` (feature `toml`)
//! - YAML via `YamlStorage` (feature `yaml`)
//!
//! ## Errors
//!
//! Registry operations return [`Error`]. Reloads triggered by a watch have no
//! caller; their failures are logged and delivered to
//! [`EventManager::on_failure`] listeners.

// Core modules
mod cache;
mod error;
mod events;
mod fs;
mod registry;
mod sync;
pub mod storage;
pub mod watcher;

// Grouped modules
pub mod config;

// Re-exports from core
pub use cache::FileCache;
pub use error::{Error, LoadFailure, Result};
pub use events::{ChangeCallback, EventManager, FailureCallback, RegistryEvent, ReloadSource};
pub use registry::{ConfigRegistry, RegistryBuilder};
pub use storage::{JsonStorage, StorageBackend};
pub use watcher::{WatchCallback, WatchSubscription};

#[cfg(feature = "toml")]
pub use storage::TomlStorage;

#[cfg(feature = "yaml")]
pub use storage::YamlStorage;

// Re-exports from config
pub use config::{
    AnyConfig, ConfigHandle, ConfigOptions, ConfigSchema, DEFAULT_DEBOUNCE, FileOptions,
    RegistryConfig, RegistryConfigBuilder, ReloadCallback, SchemaId,
};
