//! Mount configuration — binds a path prefix to a persistence backend.
//!
//! A mount with `base_directory = "Memories"` owns every path of the form
//! `/Memories/...`. Base directories are single flat segments without dots,
//! so at most one mount can match any path.

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::persistence::{Persistence, StorageOpts};

pub const DEFAULT_DEBOUNCE_MS: u64 = 5000;

/// One mount: path prefix → persistence backend + policy.
#[derive(Clone)]
pub struct FileSystemConfig {
    base_directory: String,
    persistence: Arc<dyn Persistence>,
    debounce_ms: u64,
    readonly: bool,
    storage_opts: Map<String, Value>,
}

impl FileSystemConfig {
    /// Create a mount with default policy (5 s debounce, writable).
    ///
    /// Fails with [`Error::InvalidMount`] if `base_directory` is blank,
    /// contains a separator anywhere, or contains a `.`.
    pub fn new(
        base_directory: impl Into<String>,
        persistence: Arc<dyn Persistence>,
    ) -> Result<Self> {
        let base_directory = base_directory.into();
        validate_base_directory(&base_directory)?;
        Ok(Self {
            base_directory,
            persistence,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            readonly: false,
            storage_opts: Map::new(),
        })
    }

    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    pub fn with_storage_opts(mut self, storage_opts: Map<String, Value>) -> Self {
        self.storage_opts = storage_opts;
        self
    }

    /// True iff `path` lies under `/<base_directory>/`.
    pub fn matches_path(&self, path: &str) -> bool {
        path.strip_prefix('/')
            .and_then(|rest| rest.strip_prefix(self.base_directory.as_str()))
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Options for a backend call made on behalf of `scope_id`.
    pub fn build_storage_opts(&self, scope_id: &str) -> StorageOpts {
        StorageOpts {
            scope_id: scope_id.to_string(),
            base_directory: self.base_directory.clone(),
            options: self.storage_opts.clone(),
        }
    }

    pub fn base_directory(&self) -> &str {
        &self.base_directory
    }

    pub fn persistence(&self) -> &Arc<dyn Persistence> {
        &self.persistence
    }

    pub fn debounce_ms(&self) -> u64 {
        self.debounce_ms
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }
}

impl std::fmt::Debug for FileSystemConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystemConfig")
            .field("base_directory", &self.base_directory)
            .field("persistence", &self.persistence.name())
            .field("debounce_ms", &self.debounce_ms)
            .field("readonly", &self.readonly)
            .field("storage_opts", &self.storage_opts)
            .finish()
    }
}

/// Check a mount's base directory name.
pub fn validate_base_directory(base_directory: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(Error::InvalidMount {
            base_directory: base_directory.to_string(),
            reason: reason.to_string(),
        })
    };

    if base_directory.trim().is_empty() {
        return invalid("base directory must not be blank");
    }
    if base_directory.contains(['/', '\\']) {
        return invalid("base directory must be a single segment without separators");
    }
    if base_directory.contains('.') {
        return invalid("base directory must not contain '.'");
    }
    Ok(())
}
