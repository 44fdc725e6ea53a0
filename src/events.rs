//! Event system for registry changes
//!
//! Listeners observe loads, saves, reloads and tracked-file refreshes. Failures
//! of watcher-triggered reloads have no caller to return to, so they are
//! delivered through the dedicated failure listeners instead.

use crate::error::Error;
use crate::sync::RwLockExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// What triggered a reload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadSource {
    /// An explicit `reload_config` / `reload_file` call
    Explicit,
    /// A filesystem watch subscription
    Watch,
}

/// A change observed by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A config was loaded from disk or created with defaults
    ConfigInitialized { owner: String },
    /// A config instance was replaced by a fresh one read from disk
    ConfigReloaded { owner: String, source: ReloadSource },
    /// A config instance was swapped in by `loads_config`
    ConfigReplaced { owner: String },
    /// A config was written to disk
    ConfigSaved { owner: String },
    /// A tracked file's cached content changed
    FileUpdated {
        owner: String,
        path: PathBuf,
        source: ReloadSource,
    },
}

impl RegistryEvent {
    pub fn owner(&self) -> &str {
        match self {
            RegistryEvent::ConfigInitialized { owner }
            | RegistryEvent::ConfigReloaded { owner, .. }
            | RegistryEvent::ConfigReplaced { owner }
            | RegistryEvent::ConfigSaved { owner }
            | RegistryEvent::FileUpdated { owner, .. } => owner,
        }
    }
}

/// Type alias for a change callback
pub type ChangeCallback = Arc<dyn Fn(&RegistryEvent) + Send + Sync>;

/// Type alias for a failure callback, receiving (owner, error)
pub type FailureCallback = Arc<dyn Fn(&str, &Error) + Send + Sync>;

/// Manages event listeners for registry changes
pub struct EventManager {
    /// Global listeners (called for all changes)
    global_listeners: RwLock<Vec<ChangeCallback>>,

    /// Per-owner listeners
    owner_listeners: RwLock<HashMap<String, Vec<ChangeCallback>>>,

    /// Listeners for background failures
    failure_listeners: RwLock<Vec<FailureCallback>>,
}

impl EventManager {
    /// Create a new event manager
    #[must_use]
    pub fn new() -> Self {
        Self {
            global_listeners: RwLock::new(Vec::new()),
            owner_listeners: RwLock::new(HashMap::new()),
            failure_listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register a global change listener (called for every event)
    pub fn on_change<F>(&self, callback: F)
    where
        F: Fn(&RegistryEvent) + Send + Sync + 'static,
    {
        self.global_listeners
            .write_recovered()
            .push(Arc::new(callback));
    }

    /// Register a listener for events of a single owner
    pub fn watch<F>(&self, owner: &str, callback: F)
    where
        F: Fn(&RegistryEvent) + Send + Sync + 'static,
    {
        self.add_owner_listener(owner, Arc::new(callback));
    }

    pub(crate) fn add_owner_listener(&self, owner: &str, callback: ChangeCallback) {
        self.owner_listeners
            .write_recovered()
            .entry(owner.to_string())
            .or_default()
            .push(callback);
    }

    /// Register a listener for failures of watcher-triggered reloads
    ///
    /// # Arguments
    /// * `callback` - Function receiving (`owner`, `error`)
    pub fn on_failure<F>(&self, callback: F)
    where
        F: Fn(&str, &Error) + Send + Sync + 'static,
    {
        self.failure_listeners
            .write_recovered()
            .push(Arc::new(callback));
    }

    /// Notify all listeners about a change
    pub fn notify(&self, event: &RegistryEvent) {
        // Listeners are cloned out so a callback may register further listeners
        let global: Vec<ChangeCallback> = self.global_listeners.read_recovered().clone();
        for callback in &global {
            callback(event);
        }

        let scoped: Vec<ChangeCallback> = self
            .owner_listeners
            .read_recovered()
            .get(event.owner())
            .cloned()
            .unwrap_or_default();
        for callback in &scoped {
            callback(event);
        }
    }

    /// Deliver a background failure
    pub fn notify_failure(&self, owner: &str, error: &Error) {
        let listeners: Vec<FailureCallback> = self.failure_listeners.read_recovered().clone();
        for callback in &listeners {
            callback(owner, error);
        }
    }

    /// Remove all listeners for a specific owner
    pub fn unwatch(&self, owner: &str) {
        self.owner_listeners.write_recovered().remove(owner);
    }

    /// Clear all listeners
    pub fn clear(&self) {
        self.global_listeners.write_recovered().clear();
        self.owner_listeners.write_recovered().clear();
        self.failure_listeners.write_recovered().clear();
    }
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
