//! FileSystemSupervisor — one filesystem server per scope key.
//!
//! Servers are started on demand and watched by a monitor task. A server
//! that panics or is aborted is restarted with the scope's mounts, and the
//! new server re-indexes whatever its backends hold. Writes that were still
//! waiting on a debounce timer at crash time are gone. A server that exits
//! cleanly is deregistered and never restarted.

use agentvfs_core::error::{Error, Result};
use agentvfs_core::mount::FileSystemConfig;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::server::FileSystemServer;

/// How many crash-restarts a scope gets before it is given up.
#[derive(Debug, Clone, Copy)]
pub struct RestartPolicy {
    pub max_restarts: u32,
    pub window: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_restarts: 3,
            window: Duration::from_secs(5),
        }
    }
}

struct Slot {
    generation: u64,
    server: FileSystemServer,
    abort: AbortHandle,
    configs: Vec<FileSystemConfig>,
}

struct Inner {
    registry: RwLock<HashMap<String, Slot>>,
    policy: RestartPolicy,
    generations: AtomicU64,
}

impl Inner {
    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Remove the slot only if it still belongs to `generation`.
    async fn deregister(&self, scope_key: &str, generation: u64) {
        let mut registry = self.registry.write().await;
        if registry.get(scope_key).is_some_and(|slot| slot.generation == generation) {
            registry.remove(scope_key);
        }
    }

    async fn configs_for(&self, scope_key: &str, generation: u64) -> Option<Vec<FileSystemConfig>> {
        let registry = self.registry.read().await;
        registry
            .get(scope_key)
            .filter(|slot| slot.generation == generation)
            .map(|slot| slot.configs.clone())
    }

    /// Swap a restarted server into the slot it replaces.
    async fn replace(
        &self,
        scope_key: &str,
        old_generation: u64,
        new_generation: u64,
        server: FileSystemServer,
        abort: AbortHandle,
    ) -> bool {
        let mut registry = self.registry.write().await;
        match registry.get_mut(scope_key) {
            Some(slot) if slot.generation == old_generation => {
                slot.generation = new_generation;
                slot.server = server;
                slot.abort = abort;
                true
            }
            _ => false,
        }
    }
}

/// Registry of live filesystem servers, keyed by scope.
#[derive(Clone)]
pub struct FileSystemSupervisor {
    inner: Arc<Inner>,
}

impl FileSystemSupervisor {
    pub fn new(policy: RestartPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: RwLock::new(HashMap::new()),
                policy,
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// Start a server for `scope_key`.
    ///
    /// Fails with [`Error::AlreadyStarted`] if one is live.
    pub async fn start_filesystem(
        &self,
        scope_key: &str,
        configs: Vec<FileSystemConfig>,
    ) -> Result<FileSystemServer> {
        if self.inner.registry.read().await.contains_key(scope_key) {
            return Err(Error::AlreadyStarted(scope_key.to_string()));
        }

        // Indexing may hit slow backends, so it runs without the registry lock
        let (server, handle) = FileSystemServer::spawn(scope_key, configs.clone()).await?;

        let mut registry = self.inner.registry.write().await;
        if registry.contains_key(scope_key) {
            drop(registry);
            let _ = server.shutdown().await;
            return Err(Error::AlreadyStarted(scope_key.to_string()));
        }

        let generation = self.inner.next_generation();
        registry.insert(
            scope_key.to_string(),
            Slot {
                generation,
                server: server.clone(),
                abort: handle.abort_handle(),
                configs,
            },
        );
        drop(registry);

        tokio::spawn(supervise(
            Arc::downgrade(&self.inner),
            scope_key.to_string(),
            generation,
            handle,
        ));
        info!(scope = %scope_key, "Filesystem registered");
        Ok(server)
    }

    /// Return the live server for `scope_key`, starting one if needed.
    pub async fn ensure_filesystem(
        &self,
        scope_key: &str,
        configs: Vec<FileSystemConfig>,
    ) -> Result<FileSystemServer> {
        if let Some(server) = self.get_filesystem(scope_key).await {
            return Ok(server);
        }
        match self.start_filesystem(scope_key, configs).await {
            Err(Error::AlreadyStarted(_)) => self
                .get_filesystem(scope_key)
                .await
                .ok_or_else(|| Error::NotStarted(scope_key.to_string())),
            other => other,
        }
    }

    /// Gracefully stop a scope: flush every dirty entry, then deregister.
    ///
    /// Returns the number of files flushed.
    pub async fn stop_filesystem(&self, scope_key: &str) -> Result<usize> {
        let slot = self
            .inner
            .registry
            .write()
            .await
            .remove(scope_key)
            .ok_or_else(|| Error::NotStarted(scope_key.to_string()))?;

        let flushed = slot.server.shutdown().await;
        info!(scope = %scope_key, "Filesystem stopped");
        flushed
    }

    /// Abort a scope's server without flushing. The supervisor treats this
    /// as a crash and restarts it.
    pub async fn kill_filesystem(&self, scope_key: &str) -> Result<()> {
        let registry = self.inner.registry.read().await;
        let slot = registry
            .get(scope_key)
            .ok_or_else(|| Error::NotStarted(scope_key.to_string()))?;
        warn!(scope = %scope_key, "Killing filesystem server");
        slot.abort.abort();
        Ok(())
    }

    pub async fn get_filesystem(&self, scope_key: &str) -> Option<FileSystemServer> {
        self.inner
            .registry
            .read()
            .await
            .get(scope_key)
            .map(|slot| slot.server.clone())
    }

    /// Scope keys with a registered server, sorted.
    pub async fn list_filesystems(&self) -> Vec<String> {
        let mut scopes: Vec<String> = self.inner.registry.read().await.keys().cloned().collect();
        scopes.sort();
        scopes
    }

    /// Add a mount to a running scope. The mount is also used when the
    /// scope is restarted after a crash.
    pub async fn register_persistence(
        &self,
        scope_key: &str,
        config: FileSystemConfig,
    ) -> Result<()> {
        let server = self
            .get_filesystem(scope_key)
            .await
            .ok_or_else(|| Error::NotStarted(scope_key.to_string()))?;
        server.register_persistence(config.clone()).await?;

        if let Some(slot) = self.inner.registry.write().await.get_mut(scope_key) {
            slot.configs.push(config);
        }
        Ok(())
    }

    /// Stop every scope. Flush failures are logged.
    pub async fn stop_all(&self) {
        for scope_key in self.list_filesystems().await {
            if let Err(e) = self.stop_filesystem(&scope_key).await {
                warn!(scope = %scope_key, error = %e, "Failed to stop filesystem cleanly");
            }
        }
    }
}

impl Default for FileSystemSupervisor {
    fn default() -> Self {
        Self::new(RestartPolicy::default())
    }
}

/// Watch one scope's server, restarting it after abnormal exits.
async fn supervise(
    weak: Weak<Inner>,
    scope_key: String,
    mut generation: u64,
    mut handle: JoinHandle<()>,
) {
    let mut restarts: VecDeque<Instant> = VecDeque::new();

    loop {
        let outcome = handle.await;
        let Some(inner) = weak.upgrade() else {
            return;
        };

        let reason = match outcome {
            Ok(()) => {
                inner.deregister(&scope_key, generation).await;
                debug!(scope = %scope_key, "Filesystem server exited normally");
                return;
            }
            Err(e) if e.is_panic() => "panicked",
            Err(_) => "was killed",
        };
        warn!(scope = %scope_key, reason, "Filesystem server exited abnormally");

        let now = Instant::now();
        while restarts
            .front()
            .is_some_and(|at| now.duration_since(*at) >= inner.policy.window)
        {
            restarts.pop_front();
        }
        if restarts.len() >= inner.policy.max_restarts as usize {
            error!(
                scope = %scope_key,
                max_restarts = inner.policy.max_restarts,
                "Restart limit reached, giving up on filesystem"
            );
            inner.deregister(&scope_key, generation).await;
            return;
        }
        restarts.push_back(now);

        // A stop that raced with the crash already removed the slot
        let Some(configs) = inner.configs_for(&scope_key, generation).await else {
            return;
        };

        match FileSystemServer::spawn(&scope_key, configs).await {
            Ok((server, new_handle)) => {
                let new_generation = inner.next_generation();
                let swapped = inner
                    .replace(
                        &scope_key,
                        generation,
                        new_generation,
                        server.clone(),
                        new_handle.abort_handle(),
                    )
                    .await;
                if !swapped {
                    let _ = server.shutdown().await;
                    return;
                }
                info!(scope = %scope_key, "Filesystem server restarted");
                generation = new_generation;
                handle = new_handle;
            }
            Err(e) => {
                error!(scope = %scope_key, error = %e, "Failed to restart filesystem server");
                inner.deregister(&scope_key, generation).await;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::mount;
    use agentvfs_core::file::FileOptions;
    use agentvfs_persistence::InMemoryPersistence;

    async fn wait_for_restart(
        supervisor: &FileSystemSupervisor,
        scope_key: &str,
        old: &FileSystemServer,
    ) -> FileSystemServer {
        for _ in 0..200 {
            if let Some(server) = supervisor.get_filesystem(scope_key).await
                && !server.same_server(old)
            {
                return server;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("filesystem for {scope_key} was not restarted");
    }

    #[tokio::test]
    async fn start_get_list_stop() {
        let supervisor = FileSystemSupervisor::default();
        supervisor.start_filesystem("agent-b", vec![]).await.unwrap();
        supervisor.start_filesystem("agent-a", vec![]).await.unwrap();

        assert_eq!(supervisor.list_filesystems().await, vec!["agent-a", "agent-b"]);
        assert!(supervisor.get_filesystem("agent-a").await.is_some());
        assert!(supervisor.get_filesystem("agent-z").await.is_none());

        supervisor.stop_filesystem("agent-a").await.unwrap();
        assert_eq!(supervisor.list_filesystems().await, vec!["agent-b"]);
        assert!(matches!(
            supervisor.stop_filesystem("agent-a").await,
            Err(Error::NotStarted(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_start_fails() {
        let supervisor = FileSystemSupervisor::default();
        supervisor.start_filesystem("agent-1", vec![]).await.unwrap();
        assert!(matches!(
            supervisor.start_filesystem("agent-1", vec![]).await,
            Err(Error::AlreadyStarted(_))
        ));
    }

    #[tokio::test]
    async fn ensure_reuses_live_server() {
        let supervisor = FileSystemSupervisor::default();
        let first = supervisor.ensure_filesystem("agent-1", vec![]).await.unwrap();
        let second = supervisor.ensure_filesystem("agent-1", vec![]).await.unwrap();
        assert!(first.same_server(&second));
    }

    #[tokio::test]
    async fn scopes_are_isolated() {
        let supervisor = FileSystemSupervisor::default();
        let a = supervisor.start_filesystem("agent-a", vec![]).await.unwrap();
        let b = supervisor.start_filesystem("agent-b", vec![]).await.unwrap();

        a.write_file("/scratch/x.txt", "from a", FileOptions::default())
            .await
            .unwrap();
        assert!(matches!(
            b.read_file("/scratch/x.txt").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn stop_flushes_before_deregistering() {
        let store = Arc::new(InMemoryPersistence::new());
        let supervisor = FileSystemSupervisor::default();
        let server = supervisor
            .start_filesystem("agent-1", vec![mount("Memories", store.clone(), 60_000)])
            .await
            .unwrap();
        server
            .write_file("/Memories/a.md", "a", FileOptions::default())
            .await
            .unwrap();

        assert_eq!(supervisor.stop_filesystem("agent-1").await.unwrap(), 1);
        assert_eq!(store.stored("agent-1", "/Memories/a.md").await.unwrap(), b"a");
        assert!(supervisor.get_filesystem("agent-1").await.is_none());
    }

    #[tokio::test]
    async fn killed_server_is_restarted_and_reindexed() {
        let store = Arc::new(InMemoryPersistence::new());
        let supervisor = FileSystemSupervisor::default();
        let server = supervisor
            .start_filesystem("agent-1", vec![mount("Memories", store.clone(), 60_000)])
            .await
            .unwrap();

        server
            .write_file("/Memories/flushed.md", "kept", FileOptions::default())
            .await
            .unwrap();
        server.flush_all().await.unwrap();
        server
            .write_file("/Memories/pending.md", "lost", FileOptions::default())
            .await
            .unwrap();

        supervisor.kill_filesystem("agent-1").await.unwrap();
        let restarted = wait_for_restart(&supervisor, "agent-1", &server).await;

        assert_eq!(restarted.list_files().await.unwrap(), vec!["/Memories/flushed.md"]);
        assert_eq!(restarted.read_file("/Memories/flushed.md").await.unwrap(), b"kept");
        assert!(matches!(
            restarted.read_file("/Memories/pending.md").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn restart_keeps_mounts_registered_later() {
        let store = Arc::new(InMemoryPersistence::new());
        store.seed("agent-1", "/Archive/old.md", "old").await;
        let supervisor = FileSystemSupervisor::default();
        let server = supervisor.start_filesystem("agent-1", vec![]).await.unwrap();

        supervisor
            .register_persistence("agent-1", mount("Archive", store.clone(), 0))
            .await
            .unwrap();
        supervisor.kill_filesystem("agent-1").await.unwrap();

        let restarted = wait_for_restart(&supervisor, "agent-1", &server).await;
        assert!(restarted.file_exists("/Archive/old.md").await.unwrap());
    }

    #[tokio::test]
    async fn gives_up_after_restart_limit() {
        let supervisor = FileSystemSupervisor::new(RestartPolicy {
            max_restarts: 1,
            window: Duration::from_secs(60),
        });
        let first = supervisor.start_filesystem("agent-1", vec![]).await.unwrap();

        supervisor.kill_filesystem("agent-1").await.unwrap();
        let second = wait_for_restart(&supervisor, "agent-1", &first).await;

        supervisor.kill_filesystem("agent-1").await.unwrap();
        for _ in 0..200 {
            if supervisor.get_filesystem("agent-1").await.is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(supervisor.get_filesystem("agent-1").await.is_none());
        assert!(!second.is_alive());
    }

    #[tokio::test]
    async fn kill_unknown_scope_fails() {
        let supervisor = FileSystemSupervisor::default();
        assert!(matches!(
            supervisor.kill_filesystem("ghost").await,
            Err(Error::NotStarted(_))
        ));
    }
}
