//! Tracked auxiliary files
//!
//! Owners can hand the registry arbitrary text files (templates, scripts,
//! plugin data). They are stored below `<config_dir>/<owner>/files/`, cached
//! in memory and optionally kept fresh by a watch subscription.

use super::entry::TrackedFile;
use super::{ConfigRegistry, check_owner};
use crate::config::FileOptions;
use crate::error::{Error, Result};
use crate::events::{RegistryEvent, ReloadSource};
use crate::fs;
use crate::storage::StorageBackend;
use crate::sync::RwLockExt;
use crate::watcher;

use log::{debug, info};
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

impl<S: StorageBackend> ConfigRegistry<S> {
    /// Track a file for `owner`, writing `content` to disk and caching it.
    ///
    /// `path` is relative to the owner's files directory. Tracking an already
    /// tracked path overwrites it and replaces its watch subscription.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidOwner`] or [`Error::InvalidPath`] for unusable names
    /// * write and [`Error::Watch`] errors
    pub async fn add_file(
        &self,
        owner: &str,
        path: impl AsRef<Path>,
        content: impl Into<Arc<str>>,
        options: FileOptions,
    ) -> Result<()> {
        check_owner(owner)?;
        let relative = fs::normalize_relative(path.as_ref())?;
        let content = content.into();
        let absolute = self.inner.config.file_path(owner, &relative);

        let _guard = self.inner.locks.acquire(owner).await;

        // Everything fallible happens before the tracked state is touched
        if let Some(parent) = absolute.parent() {
            fs::ensure_dir(parent).await?;
        }
        let subscription = if options.watch {
            let rel = relative.clone();
            let callback = self.watch_callback(owner, move |registry, owner| {
                let rel = rel.clone();
                async move {
                    registry.refresh_file_from_watch(&owner, &rel).await;
                }
            });
            Some(watcher::watch(
                &absolute,
                self.inner.config.debounce,
                callback,
            )?)
        } else {
            None
        };
        fs::write_atomic(&absolute, &content).await?;

        let previous = self
            .inner
            .files
            .write_recovered()
            .entry(owner.to_string())
            .or_default()
            .insert(
                relative.clone(),
                TrackedFile {
                    path: absolute,
                    _subscription: subscription,
                },
            );
        self.inner.cache.put(owner, &relative, content);
        if previous.is_some() {
            debug!("Replaced tracked file '{}' of '{owner}'", relative.display());
        }

        info!("Tracking file '{}' for '{owner}'", relative.display());
        Ok(())
    }

    /// Overwrite an already tracked file, on disk and in the cache
    ///
    /// # Errors
    ///
    /// [`Error::FileNotTracked`] if the path was never added, write errors.
    pub async fn write_file(
        &self,
        owner: &str,
        path: impl AsRef<Path>,
        content: impl Into<Arc<str>>,
    ) -> Result<()> {
        let relative = fs::normalize_relative(path.as_ref())?;
        let content = content.into();
        let _guard = self.inner.locks.acquire(owner).await;

        let absolute = self.tracked_path(owner, &relative)?;
        fs::write_atomic(&absolute, &content).await?;
        self.inner.cache.put(owner, &relative, content);

        debug!("Wrote tracked file '{}' of '{owner}'", relative.display());
        self.inner.events.notify(&RegistryEvent::FileUpdated {
            owner: owner.to_string(),
            path: relative,
            source: ReloadSource::Explicit,
        });
        Ok(())
    }

    /// Refresh a tracked file's cached content from disk and return it
    ///
    /// # Errors
    ///
    /// [`Error::FileNotTracked`], or [`Error::FileRead`] if the file cannot be
    /// read; the cached content is kept in that case.
    pub async fn reload_file(&self, owner: &str, path: impl AsRef<Path>) -> Result<Arc<str>> {
        let relative = fs::normalize_relative(path.as_ref())?;
        let _guard = self.inner.locks.acquire(owner).await;

        let absolute = self.tracked_path(owner, &relative)?;
        let content: Arc<str> = fs::read_text(&absolute)
            .await
            .map_err(|e| Error::FileRead {
                path: absolute.clone(),
                source: e,
            })?
            .into();
        self.inner.cache.put(owner, &relative, Arc::clone(&content));

        self.inner.events.notify(&RegistryEvent::FileUpdated {
            owner: owner.to_string(),
            path: relative,
            source: ReloadSource::Explicit,
        });
        Ok(content)
    }

    /// Stop tracking a file and drop it from the cache.
    ///
    /// The file on disk is left untouched. Returns whether it was tracked.
    pub async fn remove_file(&self, owner: &str, path: impl AsRef<Path>) -> Result<bool> {
        let relative = fs::normalize_relative(path.as_ref())?;
        let _guard = self.inner.locks.acquire(owner).await;

        let removed = {
            let mut files = self.inner.files.write_recovered();
            let removed = files
                .get_mut(owner)
                .and_then(|tracked| tracked.remove(&relative));
            if files.get(owner).is_some_and(|tracked| tracked.is_empty()) {
                files.remove(owner);
            }
            removed
        };
        self.inner.cache.remove(owner, &relative);

        if removed.is_some() {
            info!("Stopped tracking '{}' for '{owner}'", relative.display());
        }
        Ok(removed.is_some())
    }

    /// Relative paths of every file tracked for `owner`
    pub fn get_plugin_files(&self, owner: &str) -> BTreeSet<PathBuf> {
        self.inner.cache.paths(owner)
    }

    /// Latest known content of a tracked file
    ///
    /// # Errors
    ///
    /// [`Error::FileNotTracked`] if nothing is cached for this path.
    pub fn get_cached_file_by_path(&self, owner: &str, path: impl AsRef<Path>) -> Result<Arc<str>> {
        let path = path.as_ref();
        let not_tracked = || Error::FileNotTracked {
            owner: owner.to_string(),
            path: path.to_path_buf(),
        };
        let relative = fs::normalize_relative(path).map_err(|_| not_tracked())?;
        self.inner
            .cache
            .get(owner, &relative)
            .ok_or_else(not_tracked)
    }

    fn tracked_path(&self, owner: &str, relative: &Path) -> Result<PathBuf> {
        self.inner
            .files
            .read_recovered()
            .get(owner)
            .and_then(|files| files.get(relative))
            .map(|file| file.path.clone())
            .ok_or_else(|| Error::FileNotTracked {
                owner: owner.to_string(),
                path: relative.to_path_buf(),
            })
    }

    async fn refresh_file_from_watch(&self, owner: &str, relative: &Path) {
        let _guard = self.inner.locks.acquire(owner).await;

        let Ok(absolute) = self.tracked_path(owner, relative) else {
            return;
        };

        let content = match fs::read_text(&absolute).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Tracked file {} is absent, skipping", absolute.display());
                return;
            }
            Err(e) => {
                let err = Error::FileRead {
                    path: absolute,
                    source: e,
                };
                self.report_background_failure(owner, &err);
                return;
            }
        };

        if self.inner.cache.get(owner, relative).as_deref() == Some(content.as_str()) {
            return;
        }

        self.inner.cache.put(owner, relative, content);
        info!(
            "Refreshed tracked file '{}' of '{owner}'",
            relative.display()
        );
        self.inner.events.notify(&RegistryEvent::FileUpdated {
            owner: owner.to_string(),
            path: relative.to_path_buf(),
            source: ReloadSource::Watch,
        });
    }
}
