//! Persistence backends.
//!
//! Backends store raw strings by key. Encoding state to a string is the
//! store's job, so a backend only has to move text in and out of durable
//! storage.

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use crate::Result;

/// Key-value string storage that a [`Store`](crate::Store) saves to.
pub trait PersistBackend: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Write `data` under `key`, replacing any previous value.
    fn save(&self, key: &str, data: &str) -> Result<()>;

    /// Remove `key` from storage. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}
