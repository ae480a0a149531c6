//! Key-value persistence backends.
//!
//! The token store and the pending-course queue only need string
//! get/set/remove, so every backend implements [`KeyValueStore`]:
//!
//! - `MemoryStore`: lives as long as the process (session scoped)
//! - `FileStore`: JSON map on disk (durable)
//! - `KeyringStore`: OS keychain entries (durable, secure)
//!
//! Backends never fail loudly. A store that cannot be read behaves as empty
//! and write failures are logged.

pub mod file;
pub mod keychain;
pub mod memory;

pub use self::file::FileStore;
pub use self::keychain::KeyringStore;
pub use self::memory::MemoryStore;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}
