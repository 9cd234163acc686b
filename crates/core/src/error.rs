//! Error types for the agentvfs domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Path validation and backend I/O each have their own error type, wrapped
//! by the top-level [`Error`].

use thiserror::Error;

/// The top-level error type for all filesystem operations.
#[derive(Debug, Clone, Error)]
pub enum Error {
    // --- Path errors ---
    #[error("Invalid path: {0}")]
    InvalidPath(#[from] PathError),

    // --- Policy errors ---
    #[error("Path '{path}' is under read-only mount '{base_directory}'")]
    ReadOnly { path: String, base_directory: String },

    #[error("File not found: {0}")]
    NotFound(String),

    // --- Backend errors ---
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    // --- Mount errors ---
    #[error("A mount is already registered for base directory '{0}'")]
    DuplicateMount(String),

    #[error("Invalid mount '{base_directory}': {reason}")]
    InvalidMount {
        base_directory: String,
        reason: String,
    },

    // --- Lifecycle errors ---
    #[error("Filesystem already started for scope '{0}'")]
    AlreadyStarted(String),

    #[error("No filesystem running for scope '{0}'")]
    NotStarted(String),

    #[error("Filesystem for scope '{0}' is no longer available")]
    Unavailable(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// A path rejected by validation. Each variant names the rule it broke.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("'{path}' is not an absolute path (must start with '/')")]
    NotAbsolute { path: String },

    #[error("'{path}' contains a '..' traversal segment")]
    Traversal { path: String },

    #[error("'{path}' starts with the '~' home shortcut")]
    HomeShortcut { path: String },
}

/// Errors reported by a persistence backend.
#[derive(Debug, Clone, Error)]
pub enum PersistenceError {
    #[error("Not found in storage: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid storage options: {0}")]
    InvalidOptions(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

impl PersistenceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PersistenceError::NotFound(_))
    }
}
