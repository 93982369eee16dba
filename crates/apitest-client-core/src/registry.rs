//! The store registry: which backend data stores the server knows about and
//! which one the console is currently working against. Session-scoped, so a
//! fresh tab re-fetches the list from the server.

use serde::{Deserialize, Serialize};

use crate::ClientCache;
use crate::storage::StorageError;

pub const STORES_KEY: &str = "stores";

/// A key/value property attached to a store descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pair {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The extension kind backing a store (git, s3, orm, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreKind {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A named, independently configured backend connection the test-running
/// server can read and write suites from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreDescriptor {
    pub name: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub kind: StoreKind,
    #[serde(default)]
    pub properties: Vec<Pair>,
    #[serde(default)]
    pub params: Vec<Pair>,
}

impl StoreDescriptor {
    /// Look up a property value by key.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|pair| pair.key == key)
            .map(|pair| pair.value.as_str())
    }
}

/// The flat registry: an ordered list of descriptors plus the name of the
/// currently selected one. `current` is a weak reference: it may name a
/// store that is no longer in `items`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRegistry {
    #[serde(default)]
    pub current: String,
    #[serde(default)]
    pub items: Vec<StoreDescriptor>,
}

fn ensure_unique_names(items: &[StoreDescriptor]) -> Result<(), StorageError> {
    let mut seen = std::collections::BTreeSet::new();
    for descriptor in items {
        if !seen.insert(descriptor.name.as_str()) {
            return Err(StorageError::DuplicateStoreName(descriptor.name.clone()));
        }
    }
    Ok(())
}

impl ClientCache {
    /// Replace the registry wholesale, selection included.
    pub fn replace_store_registry(&self, registry: &StoreRegistry) -> Result<(), StorageError> {
        ensure_unique_names(&registry.items)?;
        Self::write_json(self.session(), STORES_KEY, registry)
    }

    /// Replace only the list of descriptors, keeping whatever store was
    /// previously selected.
    pub fn replace_store_items(&self, items: &[StoreDescriptor]) -> Result<(), StorageError> {
        ensure_unique_names(items)?;
        let current = self
            .store_registry()
            .map(|registry| registry.current)
            .unwrap_or_default();
        Self::write_json(
            self.session(),
            STORES_KEY,
            &StoreRegistry {
                current,
                items: items.to_vec(),
            },
        )
    }

    /// Point the selection at `name`. A silent no-op when no registry has
    /// been written yet.
    pub fn set_current_store(&self, name: &str) -> Result<(), StorageError> {
        let Some(mut registry) = self.store_registry() else {
            return Ok(());
        };
        registry.current = name.to_string();
        Self::write_json(self.session(), STORES_KEY, &registry)
    }

    #[must_use]
    pub fn store_registry(&self) -> Option<StoreRegistry> {
        Self::read_json(self.session(), STORES_KEY)
    }

    /// Resolve the currently selected store. `None` when no registry exists,
    /// nothing is selected, or the selection dangles.
    #[must_use]
    pub fn current_store(&self) -> Option<StoreDescriptor> {
        let registry = self.store_registry()?;
        registry
            .items
            .into_iter()
            .find(|descriptor| descriptor.name == registry.current)
    }

    /// The selected store's name, or the empty string, which is the shape
    /// headers want.
    #[must_use]
    pub fn current_store_name(&self) -> String {
        self.current_store()
            .map(|descriptor| descriptor.name)
            .unwrap_or_default()
    }
}
