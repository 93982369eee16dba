//! Browser-side cache layer for the API testing console.
//!
//! Everything the console remembers between interactions flows through one
//! [`ClientCache`] context: user preferences and the last visited test case
//! in the durable store, the configured backend stores, the auth token, and
//! per-case execution results in the session store. Cache reads are total:
//! a missing or malformed entry yields the documented default, never an
//! error.

pub mod extension;
pub mod preference;
pub mod registry;
pub mod response_cache;
pub mod storage;
pub mod token;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

pub use extension::{Driver, driver_name, supported_extension, supported_extensions};
pub use preference::{LastTestCaseLocation, StoredPreference};
pub use registry::{Pair, StoreDescriptor, StoreKind, StoreRegistry};
pub use response_cache::TestCaseResponse;
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError, StoreHandle};

/// The console's cache context: a session-scoped and a durable-scoped
/// key-value substrate, injected at construction so embedders and tests can
/// run isolated instances.
#[derive(Clone)]
pub struct ClientCache {
    session: StoreHandle,
    durable: StoreHandle,
}

impl ClientCache {
    #[must_use]
    pub fn new(session: StoreHandle, durable: StoreHandle) -> Self {
        Self { session, durable }
    }

    /// A cache backed entirely by in-process memory. Nothing survives the
    /// process; useful for tests and for embedders that opt out of durable
    /// state.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(
            std::sync::Arc::new(MemoryStore::new()),
            std::sync::Arc::new(MemoryStore::new()),
        )
    }

    #[must_use]
    pub fn session(&self) -> &StoreHandle {
        &self.session
    }

    #[must_use]
    pub fn durable(&self) -> &StoreHandle {
        &self.durable
    }

    pub(crate) fn read_json<T: DeserializeOwned>(store: &StoreHandle, key: &str) -> Option<T> {
        let raw = store.get(key)?;
        if raw.is_empty() {
            return None;
        }
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!("discarding malformed cache entry {key}: {error}");
                None
            }
        }
    }

    pub(crate) fn write_json<T: Serialize>(
        store: &StoreHandle,
        key: &str,
        value: &T,
    ) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value)?;
        store.set(key, &raw)
    }
}
