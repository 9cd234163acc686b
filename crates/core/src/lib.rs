//! # agentvfs Core
//!
//! Domain types, traits, and error definitions for the per-agent virtual
//! filesystem. This crate holds no runtime: it defines the file model, the
//! mount configuration and the persistence contract that the runtime and
//! backend crates implement against.
//!
//! ## Design Philosophy
//!
//! Every seam is a trait here. Implementations live in their respective
//! crates. This enables:
//! - Swapping storage backends per mount
//! - Easy testing with stub backends
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod path;
pub mod file;
pub mod mount;
pub mod persistence;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, PathError, PersistenceError, Result, ToolError};
pub use path::validate_path;
pub use file::{FileEntry, FileMetadata, FileOptions, PersistenceMode};
pub use mount::{FileSystemConfig, DEFAULT_DEBOUNCE_MS};
pub use persistence::{Persistence, StorageOpts};
pub use tool::{Tool, ToolCall, ToolDefinition, ToolRegistry, ToolResult};
