//! File entries and their derived metadata.
//!
//! A [`FileEntry`] is one file in a scope's virtual filesystem. Its lifecycle
//! flags track where the authoritative copy lives:
//!
//! - `Memory` entries exist only in the process and are never dirty.
//! - `Persisted` entries belong to a mount. They are dirty between an
//!   in-memory write and the backend confirming it.
//! - Indexed entries (`loaded == false`) are persisted files known from a
//!   backend listing whose content has not been fetched yet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::error::PathError;
use crate::path::validate_path;

pub const DEFAULT_MIME_TYPE: &str = "text/markdown";
pub const DEFAULT_ENCODING: &str = "utf-8";

/// Where a file's authoritative copy lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceMode {
    Memory,
    Persisted,
}

/// Optional attributes supplied with a write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom: HashMap<String, String>,
}

impl FileOptions {
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Attributes derived from a file's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Content size in bytes
    pub size: usize,

    pub mime_type: String,

    pub encoding: String,

    /// SHA-256 of the content, lowercase hex
    pub checksum: String,

    pub created_at: DateTime<Utc>,

    /// Never earlier than `created_at`
    pub modified_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom: HashMap<String, String>,
}

impl FileMetadata {
    /// Compute fresh metadata for new content.
    pub fn from_content(content: &[u8], opts: &FileOptions) -> Self {
        let now = Utc::now();
        Self {
            size: content.len(),
            mime_type: opts
                .mime_type
                .clone()
                .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
            encoding: opts
                .encoding
                .clone()
                .unwrap_or_else(|| DEFAULT_ENCODING.to_string()),
            checksum: checksum(content),
            created_at: now,
            modified_at: now,
            custom: opts.custom.clone(),
        }
    }

    /// Recompute for replaced content, keeping `created_at` and any
    /// attribute the new options leave unset.
    pub fn updated(&self, content: &[u8], opts: &FileOptions) -> Self {
        let mut custom = self.custom.clone();
        custom.extend(opts.custom.clone());

        Self {
            size: content.len(),
            mime_type: opts.mime_type.clone().unwrap_or_else(|| self.mime_type.clone()),
            encoding: opts.encoding.clone().unwrap_or_else(|| self.encoding.clone()),
            checksum: checksum(content),
            created_at: self.created_at,
            modified_at: Utc::now().max(self.modified_at),
            custom,
        }
    }
}

/// Lowercase hex SHA-256 of `content`.
pub fn checksum(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

/// One file in a scope's virtual filesystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<Vec<u8>>,

    persistence: PersistenceMode,

    loaded: bool,

    dirty: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<FileMetadata>,
}

impl FileEntry {
    /// A file that lives only in memory.
    pub fn new_memory_file(
        path: &str,
        content: Vec<u8>,
        opts: &FileOptions,
    ) -> Result<Self, PathError> {
        let path = validate_path(path)?;
        let metadata = FileMetadata::from_content(&content, opts);
        Ok(Self {
            path,
            content: Some(content),
            persistence: PersistenceMode::Memory,
            loaded: true,
            dirty: false,
            metadata: Some(metadata),
        })
    }

    /// A file under a mount. Starts dirty: the content exists only in
    /// memory until the first flush.
    pub fn new_persisted_file(
        path: &str,
        content: Vec<u8>,
        opts: &FileOptions,
    ) -> Result<Self, PathError> {
        let mut entry = Self::new_memory_file(path, content, opts)?;
        entry.persistence = PersistenceMode::Persisted;
        entry.dirty = true;
        Ok(entry)
    }

    /// A placeholder for a file known to exist in a backend but not fetched.
    pub fn new_indexed_file(path: &str) -> Result<Self, PathError> {
        Ok(Self {
            path: validate_path(path)?,
            content: None,
            persistence: PersistenceMode::Persisted,
            loaded: false,
            dirty: false,
            metadata: None,
        })
    }

    /// Attach content fetched from a backend. The entry is clean afterwards.
    pub fn mark_loaded(&mut self, content: Vec<u8>) {
        self.metadata = Some(FileMetadata::from_content(&content, &FileOptions::default()));
        self.content = Some(content);
        self.loaded = true;
        self.dirty = false;
    }

    /// Move a memory file under a mount. The entry is dirty until flushed.
    pub fn mark_persisted(&mut self) {
        self.persistence = PersistenceMode::Persisted;
        self.dirty = true;
    }

    /// Record that the backend confirmed a write.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Replace the content, recomputing metadata.
    pub fn update_content(&mut self, content: Vec<u8>, opts: &FileOptions) {
        self.metadata = Some(match &self.metadata {
            Some(existing) => existing.updated(&content, opts),
            None => FileMetadata::from_content(&content, opts),
        });
        self.content = Some(content);
        self.loaded = true;
        self.dirty = self.persistence == PersistenceMode::Persisted;
    }

    /// Drop content and metadata, returning a persisted entry to the
    /// indexed state.
    pub fn unload(&mut self) {
        self.content = None;
        self.metadata = None;
        self.loaded = false;
        self.dirty = false;
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn content(&self) -> Option<&[u8]> {
        self.content.as_deref()
    }

    /// Content as UTF-8, if loaded and valid.
    pub fn content_str(&self) -> Option<&str> {
        self.content().and_then(|c| std::str::from_utf8(c).ok())
    }

    pub fn persistence(&self) -> PersistenceMode {
        self.persistence
    }

    pub fn is_persisted(&self) -> bool {
        self.persistence == PersistenceMode::Persisted
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn metadata(&self) -> Option<&FileMetadata> {
        self.metadata.as_ref()
    }
}
