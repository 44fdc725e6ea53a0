//! Config schema trait, schema identity and live instance handles
//!
//! A schema is any serde-serializable type with `Default`: the default value
//! is what the registry writes when an owner's config file does not exist yet.
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! #[serde(default)]
//! struct PluginConfig {
//!     greeting: String,
//!     retries: u32,
//! }
//!
//! impl Default for PluginConfig {
//!     fn default() -> Self {
//!         Self { greeting: "hello".into(), retries: 3 }
//!     }
//! }
//!
//! // PluginConfig is now a `uniconf::ConfigSchema`
//! fn assert_schema<T: uniconf::ConfigSchema>() {}
//! assert_schema::<PluginConfig>();
//! ```

use crate::error::{Error, Result};
use crate::storage::StorageBackend;
use crate::sync::RwLockExt;
use serde::{Serialize, de::DeserializeOwned};
use std::any::{Any, TypeId};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Trait implemented by every type that can be registered as a config
pub trait ConfigSchema: Serialize + DeserializeOwned + Default + Send + Sync + 'static {}

impl<T> ConfigSchema for T where T: Serialize + DeserializeOwned + Default + Send + Sync + 'static {}

// =============================================================================
// Schema Identity
// =============================================================================

/// Runtime identity of a schema type
///
/// Equality and hashing use the `TypeId` only; the name is for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct SchemaId {
    type_id: TypeId,
    name: &'static str,
}

impl SchemaId {
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl PartialEq for SchemaId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for SchemaId {}

impl Hash for SchemaId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl std::fmt::Display for SchemaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

// =============================================================================
// Live Instance Handle
// =============================================================================

/// Shared handle to a live config instance
///
/// Every clone points at the same value. Changes made through [`write`](Self::write)
/// are visible to all holders immediately but reach disk only when the owner
/// calls `save_config`. After a reload the registry holds a *new* instance;
/// handles obtained earlier keep pointing at the old one, so fetch a fresh
/// handle from the registry instead of caching it for long.
///
/// Guards are synchronous; drop them before the next `.await`.
pub struct ConfigHandle<T> {
    inner: Arc<RwLock<T>>,
}

impl<T> ConfigHandle<T> {
    /// Wrap a detached value, e.g. to hand it to `loads_config`
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read_recovered()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.write_recovered()
    }

    /// Apply `f` to the value under the write lock
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.write())
    }

    /// Clone the current value out of the handle
    pub fn snapshot(&self) -> T
    where
        T: Clone,
    {
        self.read().clone()
    }

    /// Whether both handles refer to the same instance
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl<T: Send + Sync + 'static> ConfigHandle<T> {
    pub(crate) fn into_erased(self) -> ErasedInstance {
        self.inner
    }

    pub(crate) fn from_erased(erased: &ErasedInstance) -> Option<Self> {
        Arc::downcast::<RwLock<T>>(Arc::clone(erased))
            .ok()
            .map(|inner| Self { inner })
    }
}

impl<T> Clone for ConfigHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> From<T> for ConfigHandle<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ConfigHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ConfigHandle").field(&*self.read()).finish()
    }
}

/// Type-erased live instance: an `Arc<RwLock<T>>` behind `dyn Any`
pub(crate) type ErasedInstance = Arc<dyn Any + Send + Sync>;

/// A registered config seen without its static type
#[derive(Clone)]
pub struct AnyConfig {
    owner: String,
    schema: SchemaId,
    instance: ErasedInstance,
}

impl AnyConfig {
    pub(crate) fn new(owner: String, schema: SchemaId, instance: ErasedInstance) -> Self {
        Self {
            owner,
            schema,
            instance,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn schema(&self) -> SchemaId {
        self.schema
    }

    /// Recover the typed handle; `None` if `T` is not the registered schema
    pub fn downcast<T: ConfigSchema>(&self) -> Option<ConfigHandle<T>> {
        ConfigHandle::from_erased(&self.instance)
    }
}

impl std::fmt::Debug for AnyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyConfig")
            .field("owner", &self.owner)
            .field("schema", &self.schema.name())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Type Erasure
// =============================================================================

/// Schema operations the registry needs without knowing `T`
pub(crate) trait ErasedSchema<S: StorageBackend>: Send + Sync {
    fn id(&self) -> SchemaId;

    /// A fresh default instance
    fn defaults(&self) -> ErasedInstance;

    fn serialize(&self, storage: &S, instance: &ErasedInstance) -> Result<String>;

    fn deserialize(&self, storage: &S, content: &str) -> Result<ErasedInstance>;
}

struct SchemaVTable<T>(PhantomData<fn() -> T>);

impl<T: ConfigSchema, S: StorageBackend> ErasedSchema<S> for SchemaVTable<T> {
    fn id(&self) -> SchemaId {
        SchemaId::of::<T>()
    }

    fn defaults(&self) -> ErasedInstance {
        ConfigHandle::new(T::default()).into_erased()
    }

    fn serialize(&self, storage: &S, instance: &ErasedInstance) -> Result<String> {
        let lock = instance.downcast_ref::<RwLock<T>>().ok_or_else(|| {
            Error::Config(format!(
                "instance does not belong to schema '{}'",
                std::any::type_name::<T>()
            ))
        })?;
        let value = lock.read_recovered();
        storage.serialize(&*value)
    }

    fn deserialize(&self, storage: &S, content: &str) -> Result<ErasedInstance> {
        let value: T = storage.deserialize(content)?;
        Ok(ConfigHandle::new(value).into_erased())
    }
}

pub(crate) fn erase<T: ConfigSchema, S: StorageBackend>() -> Arc<dyn ErasedSchema<S>> {
    Arc::new(SchemaVTable::<T>(PhantomData))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::JsonStorage;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    impl Default for Sample {
        fn default() -> Self {
            Self {
                name: "sample".into(),
                count: 1,
            }
        }
    }

    #[test]
    fn test_schema_id_equality_ignores_name() {
        assert_eq!(SchemaId::of::<Sample>(), SchemaId::of::<Sample>());
        assert_ne!(SchemaId::of::<Sample>(), SchemaId::of::<String>());
        assert!(SchemaId::of::<Sample>().is::<Sample>());
        assert!(SchemaId::of::<Sample>().name().ends_with("Sample"));
    }

    #[test]
    fn test_handle_clones_share_instance() {
        let handle = ConfigHandle::new(Sample::default());
        let other = handle.clone();

        other.write().count = 10;

        assert_eq!(handle.read().count, 10);
        assert!(ConfigHandle::ptr_eq(&handle, &other));
        assert!(!ConfigHandle::ptr_eq(&handle, &ConfigHandle::new(Sample::default())));
    }

    #[test]
    fn test_erased_roundtrip_keeps_identity() {
        let handle = ConfigHandle::new(Sample::default());
        let erased = handle.clone().into_erased();

        let back = ConfigHandle::<Sample>::from_erased(&erased).unwrap();
        assert!(ConfigHandle::ptr_eq(&handle, &back));
        assert!(ConfigHandle::<String>::from_erased(&erased).is_none());
    }

    #[test]
    fn test_vtable_serialize_and_deserialize() {
        let storage = JsonStorage::compact();
        let schema = erase::<Sample, JsonStorage>();

        let defaults = schema.defaults();
        let text = schema.serialize(&storage, &defaults).unwrap();
        assert_eq!(text, r#"{"name":"sample","count":1}"#);

        let loaded = schema
            .deserialize(&storage, r#"{"name":"loaded","count":5}"#)
            .unwrap();
        let typed = ConfigHandle::<Sample>::from_erased(&loaded).unwrap();
        assert_eq!(typed.read().name, "loaded");

        assert!(matches!(
            schema.deserialize(&storage, "[]"),
            Err(Error::Deserialize(_))
        ));
    }
}
