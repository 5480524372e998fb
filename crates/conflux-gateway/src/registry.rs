//! Platform registry.
//!
//! The registry is assembled once at startup and immutable afterwards: a
//! vector in registration order (ranking tie-breaks depend on it) plus an
//! id index. Request handling never mutates the table.

use crate::error::{GatewayError, Result};
use conflux_abstraction::{PlatformAdapter, PlatformDescriptor};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// One registered platform: its adapter and static descriptor.
#[derive(Clone)]
pub struct PlatformEntry {
    /// The adapter serving this platform.
    pub adapter: Arc<dyn PlatformAdapter>,
    /// Static capability/affinity description.
    pub descriptor: PlatformDescriptor,
}

impl std::fmt::Debug for PlatformEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformEntry")
            .field("id", &self.descriptor.id)
            .finish_non_exhaustive()
    }
}

/// Immutable table of registered platforms.
#[derive(Debug, Default)]
pub struct PlatformRegistry {
    entries: Vec<PlatformEntry>,
    index: HashMap<String, usize>,
}

impl PlatformRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> PlatformRegistryBuilder {
        PlatformRegistryBuilder { entries: Vec::new() }
    }

    /// Looks up a platform by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&PlatformEntry> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    /// Whether a platform id is registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Iterates entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &PlatformEntry> {
        self.entries.iter()
    }

    /// Platform ids in registration order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.descriptor.id.clone()).collect()
    }

    /// Number of registered platforms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no platforms are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builder collecting registrations before the table is frozen.
pub struct PlatformRegistryBuilder {
    entries: Vec<PlatformEntry>,
}

impl PlatformRegistryBuilder {
    /// Registers a platform adapter with its descriptor.
    ///
    /// Registration order is preserved and used for ranking tie-breaks.
    #[must_use]
    pub fn register(
        mut self,
        adapter: Arc<dyn PlatformAdapter>,
        descriptor: PlatformDescriptor,
    ) -> Self {
        debug!(platform = %descriptor.id, "Registering platform");
        self.entries.push(PlatformEntry { adapter, descriptor });
        self
    }

    /// Freezes the table.
    ///
    /// # Errors
    /// Returns `GatewayError::Configuration` on duplicate ids or on a
    /// descriptor whose id disagrees with its adapter's name.
    pub fn build(self) -> Result<PlatformRegistry> {
        let mut index = HashMap::with_capacity(self.entries.len());
        for (i, entry) in self.entries.iter().enumerate() {
            let id = &entry.descriptor.id;
            if entry.adapter.name() != id {
                return Err(GatewayError::Configuration(format!(
                    "descriptor id '{}' does not match adapter name '{}'",
                    id,
                    entry.adapter.name()
                )));
            }
            if index.insert(id.clone(), i).is_some() {
                return Err(GatewayError::Configuration(format!(
                    "duplicate platform id '{}'",
                    id
                )));
            }
        }

        if self.entries.is_empty() {
            warn!("Building an empty platform registry; every query will fail to route");
        }

        Ok(PlatformRegistry { entries: self.entries, index })
    }
}
