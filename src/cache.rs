//! In-memory cache of tracked file contents
//!
//! Keyed by `(owner, relative path)`. There is no eviction: entries live until
//! the file is untracked or the owner is cleared.

use crate::sync::RwLockExt;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

#[derive(Default)]
pub struct FileCache {
    state: RwLock<HashMap<String, HashMap<PathBuf, Arc<str>>>>,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `content`, replacing whatever was cached before
    pub fn put(&self, owner: &str, path: &Path, content: impl Into<Arc<str>>) {
        let mut state = self.state.write_recovered();
        state
            .entry(owner.to_string())
            .or_default()
            .insert(path.to_path_buf(), content.into());
    }

    /// Exact content of the last `put` for this key
    pub fn get(&self, owner: &str, path: &Path) -> Option<Arc<str>> {
        let state = self.state.read_recovered();
        state.get(owner).and_then(|files| files.get(path)).cloned()
    }

    pub fn remove(&self, owner: &str, path: &Path) -> Option<Arc<str>> {
        let mut state = self.state.write_recovered();
        let files = state.get_mut(owner)?;
        let removed = files.remove(path);
        if files.is_empty() {
            state.remove(owner);
        }
        removed
    }

    /// All cached paths for one owner
    pub fn paths(&self, owner: &str) -> BTreeSet<PathBuf> {
        let state = self.state.read_recovered();
        state
            .get(owner)
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        self.state.write_recovered().clear();
    }
}
