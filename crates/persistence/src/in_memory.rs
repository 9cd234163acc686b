//! In-memory backend — useful for testing and ephemeral sessions.
//!
//! Storage outlives any single filesystem server as long as the backend
//! handle is shared, so a restarted scope re-indexes what was flushed.

use agentvfs_core::error::PersistenceError;
use agentvfs_core::file::FileEntry;
use agentvfs_core::persistence::{Persistence, StorageOpts};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

type ScopedPath = (String, String);

/// A backend that keeps stored files in a map keyed by (scope, path).
pub struct InMemoryPersistence {
    files: Arc<RwLock<HashMap<ScopedPath, Vec<u8>>>>,
    writes: AtomicUsize,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            files: Arc::new(RwLock::new(HashMap::new())),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of `write_to_storage` calls served so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Stored content for a scope's path, if any.
    pub async fn stored(&self, scope_id: &str, path: &str) -> Option<Vec<u8>> {
        self.files
            .read()
            .await
            .get(&(scope_id.to_string(), path.to_string()))
            .cloned()
    }

    /// Put content straight into storage, bypassing any filesystem.
    pub async fn seed(&self, scope_id: &str, path: &str, content: impl Into<Vec<u8>>) {
        self.files
            .write()
            .await
            .insert((scope_id.to_string(), path.to_string()), content.into());
    }

    /// Total number of stored files across all scopes.
    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

fn key(opts: &StorageOpts, entry: &FileEntry) -> ScopedPath {
    (opts.scope_id.clone(), entry.path().to_string())
}

#[async_trait]
impl Persistence for InMemoryPersistence {
    fn name(&self) -> &str {
        "memory"
    }

    async fn write_to_storage(
        &self,
        entry: &FileEntry,
        opts: &StorageOpts,
    ) -> Result<(), PersistenceError> {
        let content = entry.content().ok_or_else(|| {
            PersistenceError::Storage(format!("{} has no loaded content", entry.path()))
        })?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.files
            .write()
            .await
            .insert(key(opts, entry), content.to_vec());
        Ok(())
    }

    async fn load_from_storage(
        &self,
        entry: &FileEntry,
        opts: &StorageOpts,
    ) -> Result<Vec<u8>, PersistenceError> {
        self.files
            .read()
            .await
            .get(&key(opts, entry))
            .cloned()
            .ok_or_else(|| PersistenceError::NotFound(entry.path().to_string()))
    }

    async fn delete_from_storage(
        &self,
        entry: &FileEntry,
        opts: &StorageOpts,
    ) -> Result<(), PersistenceError> {
        self.files.write().await.remove(&key(opts, entry));
        Ok(())
    }

    async fn list_persisted_files(
        &self,
        scope_id: &str,
        opts: &StorageOpts,
    ) -> Result<Vec<String>, PersistenceError> {
        let prefix = format!("/{}/", opts.base_directory);
        let files = self.files.read().await;
        let mut paths: Vec<String> = files
            .keys()
            .filter(|(scope, path)| scope == scope_id && path.starts_with(&prefix))
            .map(|(_, path)| path.clone())
            .collect();
        paths.sort();
        Ok(paths)
    }
}
