//! Storage backend trait and implementations
//!
//! A storage backend is the only code that knows the on-disk byte format.
//! Both directions are synchronous and side-effect free; file I/O lives in
//! [`crate::fs`].

use crate::error::{Error, Result};
use serde::{Serialize, de::DeserializeOwned};

/// Trait for storage backend implementations
///
/// This allows swapping JSON for TOML, YAML, or other formats.
pub trait StorageBackend: Clone + Send + Sync + 'static {
    /// File extension for this storage format (e.g., "json", "toml")
    fn extension(&self) -> &str;

    /// Serialize data to string
    fn serialize<T: Serialize>(&self, data: &T) -> Result<String>;

    /// Deserialize data from string
    ///
    /// Failures must be reported as [`Error::Deserialize`] so the registry can
    /// tell a malformed file apart from an I/O problem.
    fn deserialize<T: DeserializeOwned>(&self, content: &str) -> Result<T>;
}

// =============================================================================
// JSON Storage Implementation
// =============================================================================

/// JSON storage backend (default)
#[derive(Clone, Debug)]
pub struct JsonStorage {
    /// Pretty print JSON output
    pretty: bool,
}

impl JsonStorage {
    /// Create a new JSON storage backend with pretty printing enabled
    pub fn new() -> Self {
        Self { pretty: true }
    }

    /// Create a compact JSON storage (no pretty printing)
    pub fn compact() -> Self {
        Self { pretty: false }
    }
}

impl Default for JsonStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for JsonStorage {
    fn extension(&self) -> &str {
        "json"
    }

    fn serialize<T: Serialize>(&self, data: &T) -> Result<String> {
        let out = if self.pretty {
            serde_json::to_string_pretty(data)
        } else {
            serde_json::to_string(data)
        };
        out.map_err(|e| Error::Serialize(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, content: &str) -> Result<T> {
        serde_json::from_str(content).map_err(|e| Error::Deserialize(e.to_string()))
    }
}

// =============================================================================
// TOML Storage Implementation
// =============================================================================

/// TOML storage backend
#[cfg(feature = "toml")]
#[derive(Clone, Debug, Default)]
pub struct TomlStorage;

#[cfg(feature = "toml")]
impl TomlStorage {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "toml")]
impl StorageBackend for TomlStorage {
    fn extension(&self) -> &str {
        "toml"
    }

    fn serialize<T: Serialize>(&self, data: &T) -> Result<String> {
        toml::to_string_pretty(data).map_err(|e| Error::Serialize(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, content: &str) -> Result<T> {
        toml::from_str(content).map_err(|e| Error::Deserialize(e.to_string()))
    }
}

// =============================================================================
// YAML Storage Implementation
// =============================================================================

/// YAML storage backend
#[cfg(feature = "yaml")]
#[derive(Clone, Debug, Default)]
pub struct YamlStorage;

#[cfg(feature = "yaml")]
impl YamlStorage {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "yaml")]
impl StorageBackend for YamlStorage {
    fn extension(&self) -> &str {
        "yaml"
    }

    fn serialize<T: Serialize>(&self, data: &T) -> Result<String> {
        serde_yaml::to_string(data).map_err(|e| Error::Serialize(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, content: &str) -> Result<T> {
        serde_yaml::from_str(content).map_err(|e| Error::Deserialize(e.to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================
