//! FileSystemState — the write-back cache and mount router for one scope.
//!
//! Writes land in the file table immediately. Paths under a mount become
//! persisted entries and get a debounce timer; everything else stays in
//! memory. Backend I/O happens only when a timer is claimed, on an explicit
//! flush, on delete, and on lazy reads of indexed entries.
//!
//! The state has exactly one owner (its server task), so no method takes a
//! lock. Every `&mut self` call runs to completion before the next starts.

use agentvfs_core::error::{Error, Result};
use agentvfs_core::file::{FileEntry, FileOptions};
use agentvfs_core::mount::FileSystemConfig;
use agentvfs_core::path::validate_path;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::timers::{DebounceTimers, Expired};

/// Counters describing a scope's file table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemStats {
    pub total_files: usize,
    pub memory_files: usize,
    pub persisted_files: usize,
    pub dirty_files: usize,
    /// Files with a live debounce timer
    pub pending_persist: usize,
}

pub struct FileSystemState {
    scope_key: String,
    files: HashMap<String, FileEntry>,
    /// Registration order is the routing order
    persistence_configs: Vec<FileSystemConfig>,
    debounce_timers: DebounceTimers,
}

impl FileSystemState {
    /// Build the state for a scope, indexing every mount's existing files.
    ///
    /// A mount whose listing fails starts empty; the failure is logged.
    pub async fn new(
        scope_key: impl Into<String>,
        configs: Vec<FileSystemConfig>,
        timers: DebounceTimers,
    ) -> Result<Self> {
        let mut state = Self {
            scope_key: scope_key.into(),
            files: HashMap::new(),
            persistence_configs: Vec::with_capacity(configs.len()),
            debounce_timers: timers,
        };

        for config in configs {
            state.register_persistence(config).await?;
        }

        Ok(state)
    }

    /// Add a mount and index its existing files.
    pub async fn register_persistence(&mut self, config: FileSystemConfig) -> Result<()> {
        if self
            .persistence_configs
            .iter()
            .any(|existing| existing.base_directory() == config.base_directory())
        {
            return Err(Error::DuplicateMount(config.base_directory().to_string()));
        }

        self.adopt_memory_files(&config);
        let indexed = self.index_mount(&config).await;
        info!(
            scope = %self.scope_key,
            mount = %config.base_directory(),
            backend = %config.persistence().name(),
            indexed,
            "Registered persistence mount"
        );
        self.persistence_configs.push(config);
        Ok(())
    }

    /// Bring memory files that fall under a new mount into it.
    ///
    /// On a writable mount they become dirty persisted entries with a flush
    /// scheduled, so the memory content replaces any backend copy. On a
    /// read-only mount they are dropped and the backend listing wins.
    fn adopt_memory_files(&mut self, config: &FileSystemConfig) {
        let shadowed: Vec<String> = self
            .files
            .values()
            .filter(|entry| !entry.is_persisted() && config.matches_path(entry.path()))
            .map(|entry| entry.path().to_string())
            .collect();
        let debounce = Duration::from_millis(config.debounce_ms());

        for path in shadowed {
            if config.is_readonly() {
                self.files.remove(&path);
                warn!(
                    scope = %self.scope_key,
                    path = %path,
                    mount = %config.base_directory(),
                    "Dropped memory file under read-only mount"
                );
            } else if let Some(entry) = self.files.get_mut(&path) {
                entry.mark_persisted();
                self.debounce_timers.schedule(&path, debounce);
                debug!(scope = %self.scope_key, path = %path, "Adopted memory file into mount");
            }
        }
    }

    /// Insert an indexed placeholder for every file the backend lists.
    async fn index_mount(&mut self, config: &FileSystemConfig) -> usize {
        let opts = config.build_storage_opts(&self.scope_key);
        let paths = match config
            .persistence()
            .list_persisted_files(&self.scope_key, &opts)
            .await
        {
            Ok(paths) => paths,
            Err(e) => {
                warn!(
                    scope = %self.scope_key,
                    mount = %config.base_directory(),
                    error = %e,
                    "Failed to list persisted files, mount starts empty"
                );
                return 0;
            }
        };

        let mut indexed = 0;
        for path in paths {
            let entry = match FileEntry::new_indexed_file(&path) {
                Ok(entry) if config.matches_path(entry.path()) => entry,
                Ok(_) => {
                    warn!(scope = %self.scope_key, path = %path, "Backend listed a path outside its mount");
                    continue;
                }
                Err(e) => {
                    warn!(scope = %self.scope_key, path = %path, error = %e, "Skipping invalid persisted path");
                    continue;
                }
            };

            if !self.files.contains_key(entry.path()) {
                self.files.insert(entry.path().to_string(), entry);
                indexed += 1;
            }
        }
        indexed
    }

    fn mount_index(&self, path: &str) -> Option<usize> {
        self.persistence_configs
            .iter()
            .position(|config| config.matches_path(path))
    }

    /// Write content, creating or replacing the file.
    ///
    /// On error the state is unchanged.
    pub fn write_file(&mut self, path: &str, content: Vec<u8>, opts: &FileOptions) -> Result<()> {
        let path = validate_path(path)?;

        let Some(index) = self.mount_index(&path) else {
            if let Some(entry) = self.files.get_mut(&path).filter(|e| !e.is_persisted()) {
                entry.update_content(content, opts);
            } else {
                let entry = FileEntry::new_memory_file(&path, content, opts)?;
                self.files.insert(path.clone(), entry);
            }
            debug!(scope = %self.scope_key, path = %path, "Wrote memory file");
            return Ok(());
        };

        let config = &self.persistence_configs[index];
        if config.is_readonly() {
            return Err(Error::ReadOnly {
                path,
                base_directory: config.base_directory().to_string(),
            });
        }
        let debounce = Duration::from_millis(config.debounce_ms());

        if let Some(entry) = self.files.get_mut(&path).filter(|e| e.is_persisted()) {
            entry.update_content(content, opts);
        } else {
            let entry = FileEntry::new_persisted_file(&path, content, opts)?;
            self.files.insert(path.clone(), entry);
        }

        self.debounce_timers.schedule(&path, debounce);
        debug!(
            scope = %self.scope_key,
            path = %path,
            debounce_ms = debounce.as_millis() as u64,
            "Wrote persisted file, flush scheduled"
        );
        Ok(())
    }

    /// Read a file's content, fetching it from its backend on first access.
    pub async fn read_file(&mut self, path: &str) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        let entry = self
            .files
            .get(&path)
            .ok_or_else(|| Error::NotFound(path.clone()))?;

        if entry.is_loaded() {
            return Ok(entry.content().map(<[u8]>::to_vec).unwrap_or_default());
        }

        let index = self
            .mount_index(&path)
            .ok_or_else(|| Error::NotFound(path.clone()))?;
        let config = &self.persistence_configs[index];
        let opts = config.build_storage_opts(&self.scope_key);

        match config.persistence().load_from_storage(entry, &opts).await {
            Ok(content) => {
                if let Some(entry) = self.files.get_mut(&path) {
                    entry.mark_loaded(content.clone());
                }
                debug!(scope = %self.scope_key, path = %path, bytes = content.len(), "Lazily loaded file");
                Ok(content)
            }
            Err(e) if e.is_not_found() => Err(Error::NotFound(path)),
            Err(e) => {
                warn!(scope = %self.scope_key, path = %path, error = %e, "Failed to load file");
                Err(e.into())
            }
        }
    }

    /// Remove a file. Files under a mount are deleted from its backend right
    /// away and any pending flush for them is cancelled.
    pub async fn delete_file(&mut self, path: &str) -> Result<()> {
        let path = validate_path(path)?;
        if !self.files.contains_key(&path) {
            return Err(Error::NotFound(path));
        }

        let index = self.mount_index(&path);
        if let Some(config) = index.map(|i| &self.persistence_configs[i])
            && config.is_readonly()
        {
            return Err(Error::ReadOnly {
                path,
                base_directory: config.base_directory().to_string(),
            });
        }

        let Some(entry) = self.files.remove(&path) else {
            return Err(Error::NotFound(path));
        };

        self.debounce_timers.cancel(&path);
        if let Some(config) = index.map(|i| &self.persistence_configs[i]) {
            let opts = config.build_storage_opts(&self.scope_key);
            if let Err(e) = config.persistence().delete_from_storage(&entry, &opts).await {
                warn!(scope = %self.scope_key, path = %path, error = %e, "Failed to delete file from storage");
            }
        }

        debug!(scope = %self.scope_key, path = %path, "Deleted file");
        Ok(())
    }

    /// Write one entry to its backend now if it is dirty.
    async fn persist_entry(&mut self, path: &str) -> Result<()> {
        let Some(entry) = self.files.get(path) else {
            return Ok(());
        };
        if !entry.is_dirty() {
            return Ok(());
        }
        let Some(index) = self.mount_index(path) else {
            return Ok(());
        };

        let config = &self.persistence_configs[index];
        let opts = config.build_storage_opts(&self.scope_key);
        match config.persistence().write_to_storage(entry, &opts).await {
            Ok(()) => {
                if let Some(entry) = self.files.get_mut(path) {
                    entry.mark_clean();
                }
                debug!(scope = %self.scope_key, path = %path, "Flushed file");
                Ok(())
            }
            Err(e) => {
                warn!(
                    scope = %self.scope_key,
                    path = %path,
                    error = %e,
                    "Failed to persist file, entry stays dirty"
                );
                Err(e.into())
            }
        }
    }

    /// Flush one path immediately, cancelling its pending timer.
    pub async fn flush_pending(&mut self, path: &str) -> Result<()> {
        let path = validate_path(path)?;
        if !self.files.contains_key(&path) {
            return Err(Error::NotFound(path));
        }
        self.debounce_timers.cancel(&path);
        self.persist_entry(&path).await
    }

    /// Flush every dirty entry. Every entry is attempted; the first failure
    /// is returned afterwards. Returns the number of files written.
    pub async fn flush_all(&mut self) -> Result<usize> {
        let mut dirty: Vec<String> = self
            .files
            .values()
            .filter(|entry| entry.is_dirty())
            .map(|entry| entry.path().to_string())
            .collect();
        dirty.sort();

        let mut flushed = 0;
        let mut first_error = None;
        for path in dirty {
            self.debounce_timers.cancel(&path);
            match self.persist_entry(&path).await {
                Ok(()) => flushed += 1,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(flushed),
        }
    }

    /// Handle a fired debounce timer. Failures are logged and not retried.
    pub async fn handle_expired(&mut self, expired: Expired) {
        if !self.debounce_timers.take_expired(&expired) {
            debug!(scope = %self.scope_key, path = %expired.path, "Ignoring superseded flush timer");
            return;
        }
        let _ = self.persist_entry(&expired.path).await;
    }

    /// Drop memory files and unload persisted ones. Mounts are kept.
    pub fn reset(&mut self) {
        self.debounce_timers.cancel_all();
        self.files.retain(|_, entry| entry.is_persisted());
        for entry in self.files.values_mut() {
            entry.unload();
        }
        info!(scope = %self.scope_key, remaining = self.files.len(), "Reset filesystem");
    }

    pub fn stats(&self) -> FileSystemStats {
        let mut stats = FileSystemStats {
            total_files: self.files.len(),
            pending_persist: self.debounce_timers.len(),
            ..FileSystemStats::default()
        };
        for entry in self.files.values() {
            if entry.is_persisted() {
                stats.persisted_files += 1;
            } else {
                stats.memory_files += 1;
            }
            if entry.is_dirty() {
                stats.dirty_files += 1;
            }
        }
        stats
    }

    /// All known paths, loaded or not, sorted.
    pub fn list_files(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn file_exists(&self, path: &str) -> bool {
        validate_path(path).is_ok_and(|path| self.files.contains_key(&path))
    }

    pub fn get_entry(&self, path: &str) -> Option<&FileEntry> {
        let path = validate_path(path).ok()?;
        self.files.get(&path)
    }

    pub fn scope_key(&self) -> &str {
        &self.scope_key
    }

    pub fn persistence_configs(&self) -> &[FileSystemConfig] {
        &self.persistence_configs
    }

    pub fn has_pending_flush(&self, path: &str) -> bool {
        self.debounce_timers.is_pending(path)
    }
}
