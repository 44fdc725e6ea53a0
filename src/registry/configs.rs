//! Schema-backed config operations

use super::entry::{ConfigEntry, ErasedReloadCallback};
use super::{ConfigRegistry, check_owner};
use crate::config::{
    AnyConfig, ConfigHandle, ConfigOptions, ConfigSchema, ErasedInstance, ErasedSchema, SchemaId,
    erase,
};
use crate::error::{Error, LoadFailure, Result};
use crate::events::{RegistryEvent, ReloadSource};
use crate::fs;
use crate::storage::StorageBackend;
use crate::sync::RwLockExt;
use crate::watcher;

use log::{debug, info};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

impl<S: StorageBackend> ConfigRegistry<S> {
    /// Register config schema `T` for `owner`.
    ///
    /// An existing registration for `owner` is replaced; its watch
    /// subscription is torn down first and its handles are no longer returned
    /// by [`get_config`](Self::get_config).
    ///
    /// With `init_now`, the config file is loaded right away, or created from
    /// `T::default()` when it does not exist yet. With `watch`, external edits
    /// to the file reload the instance automatically.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidOwner`] if `owner` is not usable as a directory name
    /// * [`Error::DuplicateSchema`] if `T` is already registered by another owner
    /// * [`Error::Load`] if `init_now` is set and the existing file is unreadable
    ///   or malformed; the schema stays registered but uninitialized
    /// * I/O and [`Error::Watch`] errors from creating the file or the watch
    pub async fn add_config<T: ConfigSchema>(
        &self,
        owner: &str,
        options: ConfigOptions<T>,
    ) -> Result<()> {
        check_owner(owner)?;
        let schema_id = SchemaId::of::<T>();
        let _guard = self.inner.locks.acquire(owner).await;

        {
            let mut index = self.inner.class_index.write_recovered();
            if let Some(existing) = index.get(&schema_id).filter(|o| o.as_str() != owner) {
                return Err(Error::DuplicateSchema {
                    schema: schema_id.name(),
                    existing_owner: existing.clone(),
                    owner: owner.to_string(),
                });
            }
            index.retain(|_, o| o != owner);
            index.insert(schema_id, owner.to_string());
        }

        let previous = self.inner.entries.write_recovered().remove(owner);
        if let Some(mut previous) = previous {
            if previous.subscription.take().is_some() {
                debug!("Dropped previous watch for '{owner}'");
            }
            info!(
                "Replacing config '{}' registered for '{owner}'",
                previous.schema.id()
            );
        }

        let on_reload = options.on_reload.map(|callback| -> ErasedReloadCallback {
            Arc::new(move |instance: &ErasedInstance| {
                if let Some(handle) = ConfigHandle::<T>::from_erased(instance) {
                    callback(&handle);
                }
            })
        });
        let path = self.inner.config.config_path(owner);
        self.inner.entries.write_recovered().insert(
            owner.to_string(),
            ConfigEntry::new(erase::<T, S>(), path, on_reload),
        );
        info!("Registered config '{schema_id}' for '{owner}'");

        if options.init_now {
            self.init_locked(owner).await?;
        }

        if options.watch {
            self.watch_config_locked(owner).await?;
        }

        Ok(())
    }

    /// Whether a schema is registered for `owner`
    pub fn has_config_class(&self, owner: &str) -> bool {
        self.inner.entries.read_recovered().contains_key(owner)
    }

    /// Whether `owner` has a loaded (or created) instance
    pub fn has_config_instance(&self, owner: &str) -> bool {
        self.inner
            .entries
            .read_recovered()
            .get(owner)
            .is_some_and(|entry| entry.instance.is_some())
    }

    /// Get the live instance of `owner`'s config.
    ///
    /// Repeated calls return the same instance (see [`ConfigHandle::ptr_eq`])
    /// until the entry is replaced, swapped by [`loads_config`](Self::loads_config)
    /// or reloaded.
    ///
    /// # Errors
    ///
    /// * [`Error::NotRegistered`] if no schema was registered for `owner`
    /// * [`Error::NotInitialized`] if registered but never loaded
    /// * [`Error::SchemaMismatch`] if `T` is not the registered schema
    pub fn get_config<T: ConfigSchema>(&self, owner: &str) -> Result<ConfigHandle<T>> {
        let entries = self.inner.entries.read_recovered();
        let entry = entries
            .get(owner)
            .ok_or_else(|| Error::NotRegistered(owner.to_string()))?;

        let mismatch = || Error::SchemaMismatch {
            owner: owner.to_string(),
            registered: entry.schema.id().name(),
            requested: std::any::type_name::<T>(),
        };
        if !entry.schema.id().is::<T>() {
            return Err(mismatch());
        }

        let instance = entry
            .instance
            .as_ref()
            .ok_or_else(|| Error::NotInitialized(owner.to_string()))?;
        ConfigHandle::from_erased(instance).ok_or_else(mismatch)
    }

    /// Get the live instance of schema `T`, whichever owner registered it.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownSchema`] if `T` was never registered, otherwise the
    /// errors of [`get_config`](Self::get_config).
    pub fn get_config_by_class<T: ConfigSchema>(&self) -> Result<ConfigHandle<T>> {
        let owner = self
            .owner_of::<T>()
            .ok_or_else(|| Error::UnknownSchema(std::any::type_name::<T>()))?;
        self.get_config(&owner)
    }

    /// The owner that registered schema `T`
    pub fn owner_of<T: ConfigSchema>(&self) -> Option<String> {
        self.inner
            .class_index
            .read_recovered()
            .get(&SchemaId::of::<T>())
            .cloned()
    }

    /// Adopt `instance` as `owner`'s live config.
    ///
    /// This is an identity swap, not a merge: passing an existing handle makes
    /// that very handle canonical, passing a plain value wraps it in a new one.
    /// Nothing is written to disk; call [`save_config`](Self::save_config).
    pub async fn loads_config<T: ConfigSchema>(
        &self,
        owner: &str,
        instance: impl Into<ConfigHandle<T>>,
    ) -> Result<()> {
        let handle = instance.into();
        let _guard = self.inner.locks.acquire(owner).await;

        {
            let mut entries = self.inner.entries.write_recovered();
            let entry = entries
                .get_mut(owner)
                .ok_or_else(|| Error::NotRegistered(owner.to_string()))?;
            if !entry.schema.id().is::<T>() {
                return Err(Error::SchemaMismatch {
                    owner: owner.to_string(),
                    registered: entry.schema.id().name(),
                    requested: std::any::type_name::<T>(),
                });
            }
            entry.instance = Some(handle.into_erased());
        }

        debug!("Adopted caller-supplied config for '{owner}'");
        self.inner.events.notify(&RegistryEvent::ConfigReplaced {
            owner: owner.to_string(),
        });
        Ok(())
    }

    /// Write `owner`'s live config to disk.
    ///
    /// The file is replaced atomically and parent directories are created as
    /// needed. Drop any guard obtained from the handle before awaiting this.
    ///
    /// # Errors
    ///
    /// [`Error::NotRegistered`], [`Error::NotInitialized`], serialization and
    /// write errors.
    pub async fn save_config(&self, owner: &str) -> Result<()> {
        let _guard = self.inner.locks.acquire(owner).await;

        let (schema, instance, path) = {
            let entries = self.inner.entries.read_recovered();
            let entry = entries
                .get(owner)
                .ok_or_else(|| Error::NotRegistered(owner.to_string()))?;
            let instance = entry
                .instance
                .as_ref()
                .ok_or_else(|| Error::NotInitialized(owner.to_string()))?;
            (Arc::clone(&entry.schema), Arc::clone(instance), entry.path.clone())
        };
        // Waits for callers' write guards, so the map lock must be released by now
        let content = schema.serialize(&self.inner.config.storage, &instance)?;

        fs::write_atomic(&path, &content).await?;
        self.remember_content(owner, content.into());

        info!("Config for '{owner}' saved to {}", path.display());
        self.inner.events.notify(&RegistryEvent::ConfigSaved {
            owner: owner.to_string(),
        });
        Ok(())
    }

    /// Re-read `owner`'s file and replace the live instance with a new one.
    ///
    /// There is no fallback to defaults: a missing or malformed file is an
    /// error and the previous instance stays in place.
    ///
    /// # Errors
    ///
    /// [`Error::NotRegistered`], or [`Error::Load`] with the cause.
    pub async fn reload_config(&self, owner: &str) -> Result<()> {
        let _guard = self.inner.locks.acquire(owner).await;
        self.reload_locked(owner, ReloadSource::Explicit).await
    }

    /// Load `owner`'s config, creating the file from defaults if it is missing.
    ///
    /// Does nothing if an instance already exists.
    ///
    /// # Errors
    ///
    /// [`Error::NotRegistered`], [`Error::Load`] for unreadable or malformed
    /// files, write errors when creating the default file.
    pub async fn init_config(&self, owner: &str) -> Result<()> {
        let _guard = self.inner.locks.acquire(owner).await;
        if self.has_config_instance(owner) {
            return Ok(());
        }
        self.init_locked(owner).await
    }

    /// Unregister `owner`'s config and stop watching it.
    ///
    /// The file on disk is left untouched. Returns whether anything was removed.
    pub async fn remove_config(&self, owner: &str) -> bool {
        let _guard = self.inner.locks.acquire(owner).await;

        let removed = self.inner.entries.write_recovered().remove(owner);
        self.inner
            .class_index
            .write_recovered()
            .retain(|_, o| o != owner);

        match removed {
            Some(entry) => {
                info!("Removed config '{}' of '{owner}'", entry.schema.id());
                true
            }
            None => false,
        }
    }

    /// Path of `owner`'s config file
    pub fn config_path(&self, owner: &str) -> PathBuf {
        self.inner.config.config_path(owner)
    }

    /// All registered schema types
    pub fn get_config_classes(&self) -> HashSet<SchemaId> {
        self.inner
            .entries
            .read_recovered()
            .values()
            .map(|entry| entry.schema.id())
            .collect()
    }

    /// All live instances
    pub fn get_config_instances(&self) -> Vec<AnyConfig> {
        self.inner
            .entries
            .read_recovered()
            .iter()
            .filter_map(|(owner, entry)| {
                let instance = entry.instance.as_ref()?;
                Some(AnyConfig::new(
                    owner.clone(),
                    entry.schema.id(),
                    Arc::clone(instance),
                ))
            })
            .collect()
    }

    // =========================================================================
    // Internals (caller holds the owner lock)
    // =========================================================================

    fn schema_and_path(&self, owner: &str) -> Result<(Arc<dyn ErasedSchema<S>>, PathBuf)> {
        self.inner
            .entries
            .read_recovered()
            .get(owner)
            .map(|entry| (Arc::clone(&entry.schema), entry.path.clone()))
            .ok_or_else(|| Error::NotRegistered(owner.to_string()))
    }

    fn last_content(&self, owner: &str) -> Option<Arc<str>> {
        self.inner
            .entries
            .read_recovered()
            .get(owner)
            .and_then(|entry| entry.last_content.clone())
    }

    fn remember_content(&self, owner: &str, content: Arc<str>) {
        if let Some(entry) = self.inner.entries.write_recovered().get_mut(owner) {
            entry.last_content = Some(content);
        }
    }

    /// Make `instance` live and return the owner's reload callback
    fn install(
        &self,
        owner: &str,
        instance: ErasedInstance,
        content: Arc<str>,
    ) -> Result<Option<ErasedReloadCallback>> {
        let mut entries = self.inner.entries.write_recovered();
        let entry = entries
            .get_mut(owner)
            .ok_or_else(|| Error::NotRegistered(owner.to_string()))?;
        entry.instance = Some(instance);
        entry.last_content = Some(content);
        Ok(entry.on_reload.clone())
    }

    fn parse(
        &self,
        owner: &str,
        schema: &Arc<dyn ErasedSchema<S>>,
        path: &Path,
        content: &str,
    ) -> Result<ErasedInstance> {
        schema
            .deserialize(&self.inner.config.storage, content)
            .map_err(|e| match e {
                Error::Deserialize(msg) => load_error(owner, path, LoadFailure::Malformed(msg)),
                other => other,
            })
    }

    async fn init_locked(&self, owner: &str) -> Result<()> {
        let (schema, path) = self.schema_and_path(owner)?;

        match fs::read_text(&path).await {
            Ok(content) => {
                let instance = self.parse(owner, &schema, &path, &content)?;
                self.install(owner, instance, content.into())?;
                info!("Loaded config for '{owner}' from {}", path.display());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let instance = schema.defaults();
                let content = schema.serialize(&self.inner.config.storage, &instance)?;
                fs::write_atomic(&path, &content).await?;
                self.install(owner, instance, content.into())?;
                info!("Created default config for '{owner}' at {}", path.display());
            }
            Err(e) => return Err(load_error(owner, &path, LoadFailure::Io(e))),
        }

        self.inner.events.notify(&RegistryEvent::ConfigInitialized {
            owner: owner.to_string(),
        });
        Ok(())
    }

    async fn reload_locked(&self, owner: &str, source: ReloadSource) -> Result<()> {
        let (schema, path) = self.schema_and_path(owner)?;

        let content = fs::read_text(&path).await.map_err(|e| {
            let reason = if e.kind() == ErrorKind::NotFound {
                LoadFailure::Missing
            } else {
                LoadFailure::Io(e)
            };
            load_error(owner, &path, reason)
        })?;

        let instance = self.parse(owner, &schema, &path, &content)?;
        self.finish_reload(owner, instance, content.into(), source)
    }

    fn finish_reload(
        &self,
        owner: &str,
        instance: ErasedInstance,
        content: Arc<str>,
        source: ReloadSource,
    ) -> Result<()> {
        let callback = self.install(owner, Arc::clone(&instance), content)?;

        info!("Reloaded config for '{owner}' ({source:?})");
        self.inner.events.notify(&RegistryEvent::ConfigReloaded {
            owner: owner.to_string(),
            source,
        });
        if let Some(callback) = callback {
            callback(&instance);
        }
        Ok(())
    }

    async fn watch_config_locked(&self, owner: &str) -> Result<()> {
        let path = self.inner.config.config_path(owner);
        if let Some(parent) = path.parent() {
            fs::ensure_dir(parent).await?;
        }

        let callback = self.watch_callback(owner, |registry, owner| async move {
            registry.reload_from_watch(&owner).await;
        });
        let subscription = watcher::watch(&path, self.inner.config.debounce, callback)?;

        if let Some(entry) = self.inner.entries.write_recovered().get_mut(owner) {
            entry.subscription = Some(subscription);
        }
        debug!("Watching config of '{owner}'");
        Ok(())
    }

    /// Reload triggered by the watcher; failures go to the failure listeners
    async fn reload_from_watch(&self, owner: &str) {
        let _guard = self.inner.locks.acquire(owner).await;

        // Entry removed while the event was in flight
        let Ok((schema, path)) = self.schema_and_path(owner) else {
            return;
        };

        let content = match fs::read_text(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Config of '{owner}' is absent, skipping reload");
                return;
            }
            Err(e) => {
                let err = load_error(owner, &path, LoadFailure::Io(e));
                self.report_background_failure(owner, &err);
                return;
            }
        };

        if self.last_content(owner).as_deref() == Some(content.as_str()) {
            debug!("Config of '{owner}' unchanged on disk, skipping reload");
            return;
        }

        let result = match self.parse(owner, &schema, &path, &content) {
            Ok(instance) => self.finish_reload(owner, instance, content.into(), ReloadSource::Watch),
            Err(e) => Err(e),
        };
        if let Err(err) = result {
            self.report_background_failure(owner, &err);
        }
    }
}

fn load_error(owner: &str, path: &Path, reason: LoadFailure) -> Error {
    Error::Load {
        owner: owner.to_string(),
        path: path.to_path_buf(),
        reason,
    }
}
