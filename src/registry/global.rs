//! Process-wide registry instance
//!
//! Hosts that cannot thread a registry through to every consumer can install
//! one here. The global is created lazily with [`RegistryConfig::default`]
//! on first access unless one was installed before.

use super::ConfigRegistry;
use crate::config::RegistryConfig;
use crate::sync::RwLockExt;

use log::info;
use std::sync::RwLock;

static GLOBAL: RwLock<Option<ConfigRegistry>> = RwLock::new(None);

impl ConfigRegistry {
    /// The process-wide registry, created with default settings on first use
    pub fn global() -> ConfigRegistry {
        if let Some(registry) = GLOBAL.read_recovered().as_ref() {
            return registry.clone();
        }

        GLOBAL
            .write_recovered()
            .get_or_insert_with(|| {
                info!("Creating global config registry with default settings");
                ConfigRegistry::from_validated(RegistryConfig::default())
            })
            .clone()
    }

    /// Install `registry` as the process-wide registry, returning the previous one
    pub fn set_global(registry: ConfigRegistry) -> Option<ConfigRegistry> {
        GLOBAL.write_recovered().replace(registry)
    }

    /// Remove the process-wide registry, clearing its configs and watches.
    ///
    /// Clones held elsewhere stay usable but are empty afterwards.
    pub fn reset_global() {
        let previous = GLOBAL.write_recovered().take();
        if let Some(previous) = previous {
            previous.clear();
        }
    }
}
