//! Persistence backend implementations for agentvfs.

pub mod disk;
pub mod in_memory;

pub use disk::DiskPersistence;
pub use in_memory::InMemoryPersistence;

use agentvfs_config::{AppConfig, BackendKind};
use agentvfs_core::error::Result;
use agentvfs_core::mount::FileSystemConfig;
use agentvfs_core::persistence::Persistence;
use std::path::Path;
use std::sync::Arc;

/// Instantiate the backend a mount asks for.
pub fn build_persistence(kind: BackendKind, data_dir: &Path) -> Arc<dyn Persistence> {
    match kind {
        BackendKind::Disk => Arc::new(DiskPersistence::new(data_dir)),
        BackendKind::Memory => Arc::new(InMemoryPersistence::new()),
    }
}

/// Turn every configured mount into a [`FileSystemConfig`].
///
/// Disk mounts share one backend rooted at the configured data directory.
pub fn mounts_from_config(config: &AppConfig) -> Result<Vec<FileSystemConfig>> {
    let data_dir = config.data_dir();
    let disk = build_persistence(BackendKind::Disk, &data_dir);

    config
        .mounts
        .iter()
        .map(|mount| {
            let persistence = match mount.backend {
                BackendKind::Disk => disk.clone(),
                kind => build_persistence(kind, &data_dir),
            };
            Ok(FileSystemConfig::new(mount.base_directory.clone(), persistence)?
                .with_debounce_ms(config.debounce_for(mount))
                .readonly(mount.readonly)
                .with_storage_opts(mount.storage_opts.clone()))
        })
        .collect()
}
