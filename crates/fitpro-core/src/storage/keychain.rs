use keyring::Entry;
use tracing::{debug, warn};

use super::KeyValueStore;

/// Service name under which keychain entries are filed
const SERVICE_NAME: &str = "fitpro";

/// Durable store backed by the OS keychain. Each key is one credential entry.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Option<Entry> {
        match Entry::new(&self.service, key) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, key, "Failed to create keyring entry");
                None
            }
        }
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for KeyringStore {
    fn get(&self, key: &str) -> Option<String> {
        let entry = self.entry(key)?;
        match entry.get_password() {
            Ok(value) => Some(value),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(error = %e, key, "Failed to retrieve value from keychain");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) {
        let Some(entry) = self.entry(key) else {
            return;
        };
        if let Err(e) = entry.set_password(value) {
            warn!(error = %e, key, "Failed to store value in keychain");
        }
    }

    fn remove(&self, key: &str) {
        let Some(entry) = self.entry(key) else {
            return;
        };
        match entry.delete_credential() {
            Ok(()) => {}
            Err(keyring::Error::NoEntry) => debug!(key, "No keychain entry to delete"),
            Err(e) => warn!(error = %e, key, "Failed to delete value from keychain"),
        }
    }
}
