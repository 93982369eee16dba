//! User preferences and last-visited navigation state, kept in the durable
//! store so they survive restarts.

use serde::{Deserialize, Serialize};

use crate::ClientCache;
use crate::storage::StorageError;

pub const PREFERENCE_KEY: &str = "api-testing-preference";
pub const CASE_LOCATION_KEY: &str = "api-testing-case-location";

const FALLBACK_LANGUAGE: &str = "en";

/// The persisted preference record. Reads synthesize the full record from
/// defaults when the key is absent, so callers always see every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPreference {
    pub dark_theme: bool,
    pub request_active_tab: String,
    pub response_active_tab: String,
    pub language: String,
}

impl Default for StoredPreference {
    fn default() -> Self {
        Self {
            dark_theme: false,
            request_active_tab: "body".to_string(),
            response_active_tab: "body".to_string(),
            language: detect_language(),
        }
    }
}

/// Where the user last was: a suite and a test case name, both opaque to
/// this layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastTestCaseLocation {
    pub suite: String,
    pub testcase: String,
}

/// Best-effort locale detection from the environment, normalized to the
/// browser-style `en-US` shape. `C`/`POSIX` and empty values fall back to
/// plain `en`.
#[must_use]
pub fn detect_language() -> String {
    for key in ["LC_ALL", "LC_MESSAGES", "LANG"] {
        if let Some(raw) = std::env::var(key).ok().filter(|value| !value.is_empty()) {
            let tag = raw.split('.').next().unwrap_or_default().replace('_', "-");
            if tag.is_empty() || tag == "C" || tag == "POSIX" {
                continue;
            }
            return tag;
        }
    }
    FALLBACK_LANGUAGE.to_string()
}

impl ClientCache {
    /// Read the stored preference, synthesizing defaults when absent. A
    /// stored value that no longer parses is treated the same as absent.
    #[must_use]
    pub fn preference(&self) -> StoredPreference {
        Self::read_json(self.durable(), PREFERENCE_KEY).unwrap_or_default()
    }

    /// Overwrite the preference record wholesale.
    pub fn set_preference(&self, preference: &StoredPreference) -> Result<(), StorageError> {
        Self::write_json(self.durable(), PREFERENCE_KEY, preference)
    }

    // The field updaters below are read-modify-write with no locking:
    // concurrent writers are last-write-wins.

    pub fn with_dark_theme(&self, dark_theme: bool) -> Result<(), StorageError> {
        let mut preference = self.preference();
        preference.dark_theme = dark_theme;
        self.set_preference(&preference)
    }

    pub fn with_request_active_tab(&self, tab: &str) -> Result<(), StorageError> {
        let mut preference = self.preference();
        preference.request_active_tab = tab.to_string();
        self.set_preference(&preference)
    }

    pub fn with_response_active_tab(&self, tab: &str) -> Result<(), StorageError> {
        let mut preference = self.preference();
        preference.response_active_tab = tab.to_string();
        self.set_preference(&preference)
    }

    pub fn with_locale(&self, language: &str) -> Result<(), StorageError> {
        let mut preference = self.preference();
        preference.language = language.to_string();
        self.set_preference(&preference)
    }

    #[must_use]
    pub fn last_test_case_location(&self) -> Option<LastTestCaseLocation> {
        Self::read_json(self.durable(), CASE_LOCATION_KEY)
    }

    pub fn set_last_test_case_location(
        &self,
        suite: &str,
        testcase: &str,
    ) -> Result<(), StorageError> {
        Self::write_json(
            self.durable(),
            CASE_LOCATION_KEY,
            &LastTestCaseLocation {
                suite: suite.to_string(),
                testcase: testcase.to_string(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_defaults_when_never_written() {
        let cache = ClientCache::in_memory();
        let preference = cache.preference();
        assert!(!preference.dark_theme);
        assert_eq!(preference.request_active_tab, "body");
        assert_eq!(preference.response_active_tab, "body");
        assert!(!preference.language.is_empty());
    }

    #[test]
    fn preference_round_trips() {
        let cache = ClientCache::in_memory();
        let preference = StoredPreference {
            dark_theme: true,
            request_active_tab: "header".to_string(),
            response_active_tab: "header".to_string(),
            language: "zh-cn".to_string(),
        };
        cache.set_preference(&preference).expect("set");
        assert_eq!(cache.preference(), preference);
    }

    #[test]
    fn dark_theme_updater_is_idempotent() {
        let cache = ClientCache::in_memory();
        cache.with_dark_theme(true).expect("first");
        let once = cache.preference();
        cache.with_dark_theme(true).expect("second");
        assert_eq!(cache.preference(), once);
        assert!(once.dark_theme);
    }

    #[test]
    fn field_updaters_touch_only_their_field() {
        let cache = ClientCache::in_memory();
        cache.with_dark_theme(true).expect("dark theme");
        cache.with_request_active_tab("query").expect("request tab");
        cache.with_response_active_tab("output").expect("response tab");
        cache.with_locale("zh-cn").expect("locale");

        let preference = cache.preference();
        assert!(preference.dark_theme);
        assert_eq!(preference.request_active_tab, "query");
        assert_eq!(preference.response_active_tab, "output");
        assert_eq!(preference.language, "zh-cn");
    }

    #[test]
    fn malformed_stored_preference_reads_as_defaults() {
        use crate::storage::KeyValueStore;

        let cache = ClientCache::in_memory();
        cache
            .durable()
            .set(PREFERENCE_KEY, "{not valid json")
            .expect("seed");
        assert_eq!(cache.preference(), StoredPreference::default());
    }

    #[test]
    fn preference_survives_reopen_of_the_durable_store() {
        use std::sync::Arc;

        use crate::storage::{FileStore, MemoryStore};

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache.json");

        let durable = FileStore::open(&path).expect("open");
        let cache = ClientCache::new(Arc::new(MemoryStore::new()), Arc::new(durable));
        cache.with_dark_theme(true).expect("set");
        drop(cache);

        let durable = FileStore::open(&path).expect("reopen");
        let cache = ClientCache::new(Arc::new(MemoryStore::new()), Arc::new(durable));
        assert!(cache.preference().dark_theme);
    }

    #[test]
    fn location_is_absent_until_first_set() {
        let cache = ClientCache::in_memory();
        assert_eq!(cache.last_test_case_location(), None);
    }

    #[test]
    fn location_round_trips() {
        let cache = ClientCache::in_memory();
        cache
            .set_last_test_case_location("smoke", "login")
            .expect("set");
        assert_eq!(
            cache.last_test_case_location(),
            Some(LastTestCaseLocation {
                suite: "smoke".to_string(),
                testcase: "login".to_string(),
            })
        );
    }
}
