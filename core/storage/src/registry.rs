//! Provider registry for resolving adapters by provider kind.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use researchhub_common::{Error, Provider, Result};

use crate::dropbox::{DropboxConfig, DropboxProvider};
use crate::gdrive::{GDriveConfig, GDriveProvider};
use crate::provider::StorageProvider;

/// Registry of storage provider adapters.
///
/// Holds at most one adapter per provider kind. Iteration order is the
/// provider order, so mirroring and provisioning visit providers
/// deterministically.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: BTreeMap<Provider, Arc<dyn StorageProvider>>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under the provider kind it reports.
    ///
    /// # Errors
    /// - Returns error if an adapter for that kind is already registered
    pub fn register(&mut self, adapter: Arc<dyn StorageProvider>) -> Result<()> {
        let kind = adapter.kind();
        if self.adapters.contains_key(&kind) {
            return Err(Error::Conflict(format!(
                "Provider '{}' is already registered",
                kind
            )));
        }
        self.adapters.insert(kind, adapter);
        Ok(())
    }

    /// Resolve the adapter for a provider kind.
    pub fn get(&self, kind: Provider) -> Option<Arc<dyn StorageProvider>> {
        self.adapters.get(&kind).cloned()
    }

    /// Registered provider kinds.
    pub fn providers(&self) -> Vec<Provider> {
        self.adapters.keys().copied().collect()
    }

    /// Check if a provider is registered.
    pub fn has_provider(&self, kind: Provider) -> bool {
        self.adapters.contains_key(&kind)
    }
}

/// Create a registry with the HTTP adapters for every supported provider.
pub fn create_default_registry(
    gdrive: GDriveConfig,
    dropbox: DropboxConfig,
    timeout: Duration,
) -> Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(GDriveProvider::new(gdrive, timeout)?))?;
    registry.register(Arc::new(DropboxProvider::new(dropbox, timeout)?))?;
    Ok(registry)
}
