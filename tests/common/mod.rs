//! Common test utilities for uniconf integration tests
//!
//! Provides shared test fixtures, config schemas, and helper functions.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use uniconf::ConfigRegistry;

// =============================================================================
// Test Config Schemas
// =============================================================================

/// The config most tests register
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestConfig {
    pub option1: String,
    pub option2: u32,
    pub enabled: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            option1: "default_value".to_string(),
            option2: 42,
            enabled: true,
        }
    }
}

/// A second, unrelated schema
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OtherConfig {
    pub endpoint: String,
    pub retries: u8,
}

impl Default for OtherConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost".to_string(),
            retries: 3,
        }
    }
}

// =============================================================================
// Test Fixtures
// =============================================================================

/// Test fixture that provides a temporary directory and a registry rooted in it
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub registry: ConfigRegistry,
}

impl TestFixture {
    /// Create a new fixture with the default JSON backend
    pub fn new() -> Self {
        Self::with_debounce(Duration::from_millis(100))
    }

    /// Create a fixture with a custom watch debounce window
    pub fn with_debounce(debounce: Duration) -> Self {
        init_logging();
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let registry = ConfigRegistry::builder("test-host")
            .config_dir(temp_dir.path())
            .debounce(debounce)
            .build()
            .expect("Failed to create registry");

        Self { temp_dir, registry }
    }

    /// Get the config root directory
    pub fn config_dir(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }

    /// Get an owner's config file path
    pub fn config_path(&self, owner: &str) -> PathBuf {
        self.temp_dir.path().join(owner).join("config.json")
    }

    /// Get a tracked file's path
    pub fn file_path(&self, owner: &str, relative: &str) -> PathBuf {
        self.temp_dir.path().join(owner).join("files").join(relative)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Route `log` output through the test harness
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Read and parse a JSON config file
pub fn read_config_file(path: &Path) -> serde_json::Value {
    let content = std::fs::read_to_string(path).expect("Failed to read config file");
    serde_json::from_str(&content).expect("Failed to parse config file")
}

/// Write raw text to a file, creating parent directories
pub fn write_raw(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    std::fs::write(path, content).expect("Failed to write file");
}

/// Write raw text the way an external editor would (temp file + rename)
pub fn write_external(path: &Path, content: &str) {
    let temp = path.with_extension("edit-swap");
    write_raw(&temp, content);
    std::fs::rename(&temp, path).expect("Failed to rename file");
}

/// Poll `check` until it returns true or ~10 seconds have passed
pub async fn wait_until<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

/// Give the OS watcher time to register before editing files
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(250)).await;
}
