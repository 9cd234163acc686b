//! Virtual path validation.
//!
//! Paths are flat string keys in absolute form (`/Memories/notes.md`). There
//! are no directory objects; the separator only matters for mount routing.

use crate::error::PathError;

/// Validate a virtual path and return its normalized form.
///
/// Checks, in order:
/// 1. Not empty
/// 2. No leading `~` home shortcut
/// 3. No `..` traversal segment
/// 4. Starts with `/`
///
/// Normalization collapses repeated separators, drops `.` segments and
/// strips a trailing separator. Whitespace is part of the path as given.
pub fn validate_path(path: &str) -> Result<String, PathError> {
    if path.is_empty() {
        return Err(PathError::Empty);
    }

    if path.starts_with('~') {
        return Err(PathError::HomeShortcut { path: path.into() });
    }

    if path.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(PathError::Traversal { path: path.into() });
    }

    if !path.starts_with('/') {
        return Err(PathError::NotAbsolute { path: path.into() });
    }

    let segments: Vec<&str> = path
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();

    // "/" alone names no file
    if segments.is_empty() {
        return Err(PathError::NotAbsolute { path: path.into() });
    }

    Ok(format!("/{}", segments.join("/")))
}
