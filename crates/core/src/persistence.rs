//! Persistence trait — the contract every mount backend satisfies.
//!
//! The virtual filesystem never touches durable storage directly. Each mount
//! carries an `Arc<dyn Persistence>` and every call receives the
//! [`StorageOpts`] built for the calling scope, so a backend can namespace
//! its storage without the filesystem knowing how.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PersistenceError;
use crate::file::FileEntry;

/// Options handed to every backend call.
///
/// `scope_id` and `base_directory` are always filled in by the mount; the
/// remaining keys are passed through from configuration untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageOpts {
    pub scope_id: String,

    pub base_directory: String,

    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl StorageOpts {
    /// Look up a pass-through option as a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }
}

/// The core Persistence trait.
///
/// Implementations: disk, in-memory (see `agentvfs-persistence`), or any
/// custom store.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// The backend name (e.g., "disk", "memory").
    fn name(&self) -> &str;

    /// Durably store the entry's current content.
    async fn write_to_storage(
        &self,
        entry: &FileEntry,
        opts: &StorageOpts,
    ) -> Result<(), PersistenceError>;

    /// Fetch content for an entry. Missing files yield
    /// [`PersistenceError::NotFound`].
    async fn load_from_storage(
        &self,
        entry: &FileEntry,
        opts: &StorageOpts,
    ) -> Result<Vec<u8>, PersistenceError>;

    /// Remove the entry from storage.
    async fn delete_from_storage(
        &self,
        entry: &FileEntry,
        opts: &StorageOpts,
    ) -> Result<(), PersistenceError>;

    /// Every stored path for this scope under `opts.base_directory`.
    async fn list_persisted_files(
        &self,
        scope_id: &str,
        opts: &StorageOpts,
    ) -> Result<Vec<String>, PersistenceError>;
}
