//! Disk backend — one real file per virtual file.
//!
//! Layout: `<root>/<scope>/<virtual path>`, e.g. a write to
//! `/Memories/notes.md` in scope `agent-1` lands at
//! `<root>/agent-1/Memories/notes.md`. A `root` key in the storage options
//! overrides the backend's root for that mount.
//!
//! Writes go to a sibling temp file first and are renamed into place, so a
//! crash mid-write never leaves a torn file behind.
//!
//! Virtual paths map one to one onto real paths, so a file cannot share its
//! name with a directory: once `/Memories/a` exists, writing
//! `/Memories/a/b` fails with [`PersistenceError::Storage`], and the same
//! holds the other way round. The failed flush leaves the entry dirty.

use agentvfs_core::error::PersistenceError;
use agentvfs_core::file::FileEntry;
use agentvfs_core::persistence::{Persistence, StorageOpts};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const TEMP_SUFFIX: &str = ".agentvfs-tmp";

/// A persistence backend storing files under a root directory.
pub struct DiskPersistence {
    root: PathBuf,
}

impl DiskPersistence {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scope_dir(&self, scope_id: &str, opts: &StorageOpts) -> PathBuf {
        let root = opts.get_str("root").map(PathBuf::from).unwrap_or_else(|| self.root.clone());
        root.join(sanitize_scope(scope_id))
    }

    /// Real location of a virtual path. Validated paths contain no `..`.
    fn file_path(&self, opts: &StorageOpts, virtual_path: &str) -> PathBuf {
        let mut path = self.scope_dir(&opts.scope_id, opts);
        for segment in virtual_path.split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path
    }
}

/// Make a scope id safe to use as a single directory name.
fn sanitize_scope(scope_id: &str) -> String {
    let cleaned: String = scope_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() { "_".to_string() } else { cleaned }
}

fn storage_err(action: &str, path: &Path, e: std::io::Error) -> PersistenceError {
    PersistenceError::Storage(format!("Failed to {action} {}: {e}", path.display()))
}

#[async_trait]
impl Persistence for DiskPersistence {
    fn name(&self) -> &str {
        "disk"
    }

    async fn write_to_storage(
        &self,
        entry: &FileEntry,
        opts: &StorageOpts,
    ) -> Result<(), PersistenceError> {
        let content = entry.content().ok_or_else(|| {
            PersistenceError::Storage(format!("{} has no loaded content", entry.path()))
        })?;
        let target = self.file_path(opts, entry.path());

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_err("create directory", parent, e))?;
        }

        let mut temp = target.clone().into_os_string();
        temp.push(TEMP_SUFFIX);
        let temp = PathBuf::from(temp);

        tokio::fs::write(&temp, content)
            .await
            .map_err(|e| storage_err("write", &temp, e))?;
        if let Err(e) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(storage_err("rename into", &target, e));
        }

        debug!(path = %target.display(), bytes = content.len(), "Wrote file to disk");
        Ok(())
    }

    async fn load_from_storage(
        &self,
        entry: &FileEntry,
        opts: &StorageOpts,
    ) -> Result<Vec<u8>, PersistenceError> {
        let source = self.file_path(opts, entry.path());
        match tokio::fs::read(&source).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(PersistenceError::NotFound(entry.path().to_string()))
            }
            Err(e) => Err(storage_err("read", &source, e)),
        }
    }

    async fn delete_from_storage(
        &self,
        entry: &FileEntry,
        opts: &StorageOpts,
    ) -> Result<(), PersistenceError> {
        let target = self.file_path(opts, entry.path());
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_err("delete", &target, e)),
        }
    }

    async fn list_persisted_files(
        &self,
        scope_id: &str,
        opts: &StorageOpts,
    ) -> Result<Vec<String>, PersistenceError> {
        let mount_dir = self.scope_dir(scope_id, opts).join(&opts.base_directory);
        let mut paths = Vec::new();
        let mut pending = vec![(mount_dir, format!("/{}", opts.base_directory))];

        while let Some((dir, virtual_dir)) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(storage_err("list", &dir, e)),
            };

            while let Some(item) = entries
                .next_entry()
                .await
                .map_err(|e| storage_err("list", &dir, e))?
            {
                let name = item.file_name().to_string_lossy().into_owned();
                let virtual_path = format!("{virtual_dir}/{name}");
                let file_type = item
                    .file_type()
                    .await
                    .map_err(|e| storage_err("inspect", &item.path(), e))?;

                if file_type.is_dir() {
                    pending.push((item.path(), virtual_path));
                } else if !name.ends_with(TEMP_SUFFIX) {
                    paths.push(virtual_path);
                }
            }
        }

        paths.sort();
        Ok(paths)
    }
}
