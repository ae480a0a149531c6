use std::sync::Arc;

use tracing::debug;

use crate::storage::KeyValueStore;

/// Key under which the bearer token is stored
pub const TOKEN_KEY: &str = "token";

/// Persists the bearer token.
///
/// Clone is cheap and every clone shares the same backend, so the auth and
/// course clients always see the same token.
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn save(&self, token: &str) {
        debug!("Saving bearer token");
        self.store.set(TOKEN_KEY, token);
    }

    /// Stored token, treating an empty entry as no token
    pub fn get(&self) -> Option<String> {
        self.store.get(TOKEN_KEY).filter(|t| !t.is_empty())
    }

    pub fn remove(&self) {
        debug!("Removing bearer token");
        self.store.remove(TOKEN_KEY);
    }

    /// Remove the stored token only if it is still `token`. Returns whether
    /// it was removed. A token saved by a later login survives a rejection
    /// of the one it replaced.
    pub fn remove_if(&self, token: &str) -> bool {
        if self.get().as_deref() != Some(token) {
            debug!("Stored token changed, keeping it");
            return false;
        }
        self.remove();
        true
    }

    /// Presence check only; expiry is checked when the token is used
    pub fn is_authenticated(&self) -> bool {
        self.get().is_some()
    }
}
