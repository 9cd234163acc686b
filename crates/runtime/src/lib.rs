//! # agentvfs Runtime
//!
//! The write-back cache and the processes that own it.
//!
//! - [`FileSystemState`] — one scope's file table, mounts and debounce timers
//! - [`FileSystemServer`] — an actor task serializing every operation on a state
//! - [`FileSystemSupervisor`] — scope registry that restarts crashed servers
//!
//! Writes land in memory first. Entries under a persisted mount are flushed
//! to their backend once the mount's debounce period passes without another
//! write, on an explicit flush, or when the server shuts down gracefully.

pub mod server;
pub mod state;
pub mod supervisor;
pub mod timers;

#[cfg(test)]
mod test_helpers;

pub use server::FileSystemServer;
pub use state::{FileSystemState, FileSystemStats};
pub use supervisor::{FileSystemSupervisor, RestartPolicy};
pub use timers::{DebounceTimers, Expired};
