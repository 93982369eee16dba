//! The session auth token. One opaque string; an absent token reads as the
//! empty string, which is exactly what request headers want.

use crate::ClientCache;
use crate::storage::{KeyValueStore, StorageError};

pub const TOKEN_KEY: &str = "token";

impl ClientCache {
    #[must_use]
    pub fn auth_token(&self) -> String {
        self.session().get(TOKEN_KEY).unwrap_or_default()
    }

    pub fn set_auth_token(&self, token: &str) -> Result<(), StorageError> {
        self.session().set(TOKEN_KEY, token)
    }

    pub fn clear_auth_token(&self) -> Result<(), StorageError> {
        self.session().remove(TOKEN_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_token_reads_as_empty_string() {
        let cache = ClientCache::in_memory();
        assert_eq!(cache.auth_token(), "");
    }

    #[test]
    fn token_round_trips_and_clears() {
        let cache = ClientCache::in_memory();
        cache.set_auth_token("secret-token").expect("set");
        assert_eq!(cache.auth_token(), "secret-token");

        cache.clear_auth_token().expect("clear");
        assert_eq!(cache.auth_token(), "");
    }
}
