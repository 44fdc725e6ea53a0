//! Core configuration types and traits
//!
//! This module contains the foundational types for the registry:
//! - `RegistryConfig` - Where and how the registry stores files
//! - `ConfigSchema` - Trait satisfied by every registrable config type
//! - `ConfigHandle` - Shared handle to a live config instance
//! - `ConfigOptions` / `FileOptions` - Per-registration options

mod schema;
mod types;

pub use schema::{AnyConfig, ConfigHandle, ConfigSchema, SchemaId};
pub(crate) use schema::{ErasedInstance, ErasedSchema, erase};

pub use types::{
    ConfigOptions, DEFAULT_DEBOUNCE, FileOptions, RegistryConfig, RegistryConfigBuilder,
    ReloadCallback,
};
pub(crate) use types::is_single_component;
