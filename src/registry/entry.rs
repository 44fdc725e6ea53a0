//! Per-owner registry records

use crate::config::{ErasedInstance, ErasedSchema};
use crate::storage::StorageBackend;
use crate::watcher::WatchSubscription;
use std::path::PathBuf;
use std::sync::Arc;

/// Reload callback with the schema type erased
pub(crate) type ErasedReloadCallback = Arc<dyn Fn(&ErasedInstance) + Send + Sync>;

/// Everything the registry knows about one owner's config
pub(crate) struct ConfigEntry<S: StorageBackend> {
    pub schema: Arc<dyn ErasedSchema<S>>,

    /// Resolved config file path
    pub path: PathBuf,

    /// Live instance; `None` until loaded or created
    pub instance: Option<ErasedInstance>,

    /// Text last written to or read from `path`
    ///
    /// Watch events whose file content equals this are our own writes.
    pub last_content: Option<Arc<str>>,

    pub on_reload: Option<ErasedReloadCallback>,

    pub subscription: Option<WatchSubscription>,
}

impl<S: StorageBackend> ConfigEntry<S> {
    pub fn new(
        schema: Arc<dyn ErasedSchema<S>>,
        path: PathBuf,
        on_reload: Option<ErasedReloadCallback>,
    ) -> Self {
        Self {
            schema,
            path,
            instance: None,
            last_content: None,
            on_reload,
            subscription: None,
        }
    }
}

/// A tracked auxiliary file; its content lives in the `FileCache`
pub(crate) struct TrackedFile {
    /// Absolute path on disk
    pub path: PathBuf,

    /// Kept alive for as long as the file is tracked
    pub _subscription: Option<WatchSubscription>,
}
