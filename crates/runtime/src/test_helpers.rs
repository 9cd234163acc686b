//! Shared test helpers for runtime tests.

use agentvfs_core::error::PersistenceError;
use agentvfs_core::file::FileEntry;
use agentvfs_core::mount::FileSystemConfig;
use agentvfs_core::persistence::{Persistence, StorageOpts};
use agentvfs_persistence::InMemoryPersistence;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A mount over `store` with the given debounce.
pub fn mount<P: Persistence + 'static>(
    base_directory: &str,
    store: Arc<P>,
    debounce_ms: u64,
) -> FileSystemConfig {
    FileSystemConfig::new(base_directory, store)
        .unwrap()
        .with_debounce_ms(debounce_ms)
}

/// An in-memory backend whose operations can be switched to fail.
pub struct FlakyPersistence {
    pub inner: InMemoryPersistence,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
    fail_listing: AtomicBool,
    attempted_writes: AtomicUsize,
}

impl FlakyPersistence {
    pub fn new() -> Self {
        Self {
            inner: InMemoryPersistence::new(),
            fail_writes: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            fail_listing: AtomicBool::new(false),
            attempted_writes: AtomicUsize::new(0),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Write calls received, successful or not.
    pub fn attempted_writes(&self) -> usize {
        self.attempted_writes.load(Ordering::SeqCst)
    }
}

fn injected(op: &str) -> PersistenceError {
    PersistenceError::Storage(format!("injected {op} failure"))
}

#[async_trait::async_trait]
impl Persistence for FlakyPersistence {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn write_to_storage(
        &self,
        entry: &FileEntry,
        opts: &StorageOpts,
    ) -> Result<(), PersistenceError> {
        self.attempted_writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected("write"));
        }
        self.inner.write_to_storage(entry, opts).await
    }

    async fn load_from_storage(
        &self,
        entry: &FileEntry,
        opts: &StorageOpts,
    ) -> Result<Vec<u8>, PersistenceError> {
        self.inner.load_from_storage(entry, opts).await
    }

    async fn delete_from_storage(
        &self,
        entry: &FileEntry,
        opts: &StorageOpts,
    ) -> Result<(), PersistenceError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(injected("delete"));
        }
        self.inner.delete_from_storage(entry, opts).await
    }

    async fn list_persisted_files(
        &self,
        scope_id: &str,
        opts: &StorageOpts,
    ) -> Result<Vec<String>, PersistenceError> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(injected("listing"));
        }
        self.inner.list_persisted_files(scope_id, opts).await
    }
}
