//! FileSystemServer — the live worker for one scope.
//!
//! Each server is a tokio task that owns a [`FileSystemState`] and drains a
//! bounded mailbox, so every operation against a scope runs strictly one at
//! a time in arrival order. Debounce expiries arrive on a second channel
//! into the same loop and are serialized with caller requests.
//!
//! Clean exits (explicit shutdown, or every handle dropped) flush all dirty
//! entries first. An aborted or panicked task skips that flush.

use agentvfs_core::error::{Error, Result};
use agentvfs_core::file::{FileEntry, FileOptions};
use agentvfs_core::mount::FileSystemConfig;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::state::{FileSystemState, FileSystemStats};
use crate::timers::{DebounceTimers, Expired};

const MAILBOX_CAPACITY: usize = 64;

enum Request {
    Write {
        path: String,
        content: Vec<u8>,
        opts: FileOptions,
        reply: oneshot::Sender<Result<()>>,
    },
    Read {
        path: String,
        reply: oneshot::Sender<Result<Vec<u8>>>,
    },
    Delete {
        path: String,
        reply: oneshot::Sender<Result<()>>,
    },
    List {
        reply: oneshot::Sender<Vec<String>>,
    },
    Exists {
        path: String,
        reply: oneshot::Sender<bool>,
    },
    Entry {
        path: String,
        reply: oneshot::Sender<Option<FileEntry>>,
    },
    Stats {
        reply: oneshot::Sender<FileSystemStats>,
    },
    Flush {
        path: String,
        reply: oneshot::Sender<Result<()>>,
    },
    FlushAll {
        reply: oneshot::Sender<Result<usize>>,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
    RegisterPersistence {
        config: FileSystemConfig,
        reply: oneshot::Sender<Result<()>>,
    },
    Shutdown {
        reply: oneshot::Sender<Result<usize>>,
    },
}

/// A cloneable handle to a running filesystem server.
#[derive(Clone)]
pub struct FileSystemServer {
    scope_key: Arc<str>,
    requests: mpsc::Sender<Request>,
}

impl FileSystemServer {
    /// Index the mounts and start the worker task.
    ///
    /// The returned join handle resolves when the task ends; a panic or
    /// abort shows up as a `JoinError`.
    pub async fn spawn(
        scope_key: &str,
        configs: Vec<FileSystemConfig>,
    ) -> Result<(Self, JoinHandle<()>)> {
        let (timers, expirations) = DebounceTimers::channel();
        let state = FileSystemState::new(scope_key, configs, timers).await?;
        let (requests, mailbox) = mpsc::channel(MAILBOX_CAPACITY);

        let handle = tokio::spawn(run(state, mailbox, expirations));
        info!(scope = %scope_key, "Filesystem server started");

        Ok((
            Self {
                scope_key: Arc::from(scope_key),
                requests,
            },
            handle,
        ))
    }

    pub fn scope_key(&self) -> &str {
        &self.scope_key
    }

    /// Whether the worker is still accepting requests.
    pub fn is_alive(&self) -> bool {
        !self.requests.is_closed()
    }

    /// Whether two handles address the same worker.
    pub fn same_server(&self, other: &FileSystemServer) -> bool {
        self.requests.same_channel(&other.requests)
    }

    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Request) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(make(reply))
            .await
            .map_err(|_| Error::Unavailable(self.scope_key.to_string()))?;
        response
            .await
            .map_err(|_| Error::Unavailable(self.scope_key.to_string()))
    }

    pub async fn write_file(
        &self,
        path: &str,
        content: impl Into<Vec<u8>>,
        opts: FileOptions,
    ) -> Result<()> {
        let path = path.to_string();
        let content = content.into();
        self.call(|reply| Request::Write {
            path,
            content,
            opts,
            reply,
        })
        .await?
    }

    pub async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let path = path.to_string();
        self.call(|reply| Request::Read { path, reply }).await?
    }

    pub async fn delete_file(&self, path: &str) -> Result<()> {
        let path = path.to_string();
        self.call(|reply| Request::Delete { path, reply }).await?
    }

    pub async fn list_files(&self) -> Result<Vec<String>> {
        self.call(|reply| Request::List { reply }).await
    }

    pub async fn file_exists(&self, path: &str) -> Result<bool> {
        let path = path.to_string();
        self.call(|reply| Request::Exists { path, reply }).await
    }

    /// A snapshot of one entry, flags included.
    pub async fn get_entry(&self, path: &str) -> Result<Option<FileEntry>> {
        let path = path.to_string();
        self.call(|reply| Request::Entry { path, reply }).await
    }

    pub async fn stats(&self) -> Result<FileSystemStats> {
        self.call(|reply| Request::Stats { reply }).await
    }

    pub async fn flush(&self, path: &str) -> Result<()> {
        let path = path.to_string();
        self.call(|reply| Request::Flush { path, reply }).await?
    }

    pub async fn flush_all(&self) -> Result<usize> {
        self.call(|reply| Request::FlushAll { reply }).await?
    }

    pub async fn reset(&self) -> Result<()> {
        self.call(|reply| Request::Reset { reply }).await
    }

    pub async fn register_persistence(&self, config: FileSystemConfig) -> Result<()> {
        self.call(|reply| Request::RegisterPersistence { config, reply })
            .await?
    }

    /// Flush everything and stop the worker. Requests still queued behind
    /// the shutdown fail with [`Error::Unavailable`].
    pub async fn shutdown(&self) -> Result<usize> {
        self.call(|reply| Request::Shutdown { reply }).await?
    }
}

impl std::fmt::Debug for FileSystemServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystemServer")
            .field("scope_key", &self.scope_key)
            .field("alive", &self.is_alive())
            .finish()
    }
}

async fn run(
    mut state: FileSystemState,
    mut mailbox: mpsc::Receiver<Request>,
    mut expirations: mpsc::UnboundedReceiver<Expired>,
) {
    loop {
        tokio::select! {
            request = mailbox.recv() => match request {
                Some(Request::Shutdown { reply }) => {
                    let result = state.flush_all().await;
                    let _ = reply.send(result);
                    break;
                }
                Some(request) => handle(&mut state, request).await,
                None => {
                    if let Err(e) = state.flush_all().await {
                        warn!(scope = %state.scope_key(), error = %e, "Final flush incomplete");
                    }
                    break;
                }
            },
            Some(expired) = expirations.recv() => state.handle_expired(expired).await,
        }
    }

    info!(scope = %state.scope_key(), "Filesystem server stopped");
}

async fn handle(state: &mut FileSystemState, request: Request) {
    // A dropped reply receiver only means the caller stopped waiting
    match request {
        Request::Write {
            path,
            content,
            opts,
            reply,
        } => {
            let _ = reply.send(state.write_file(&path, content, &opts));
        }
        Request::Read { path, reply } => {
            let _ = reply.send(state.read_file(&path).await);
        }
        Request::Delete { path, reply } => {
            let _ = reply.send(state.delete_file(&path).await);
        }
        Request::List { reply } => {
            let _ = reply.send(state.list_files());
        }
        Request::Exists { path, reply } => {
            let _ = reply.send(state.file_exists(&path));
        }
        Request::Entry { path, reply } => {
            let _ = reply.send(state.get_entry(&path).cloned());
        }
        Request::Stats { reply } => {
            let _ = reply.send(state.stats());
        }
        Request::Flush { path, reply } => {
            let _ = reply.send(state.flush_pending(&path).await);
        }
        Request::FlushAll { reply } => {
            let _ = reply.send(state.flush_all().await);
        }
        Request::Reset { reply } => {
            state.reset();
            let _ = reply.send(());
        }
        Request::RegisterPersistence { config, reply } => {
            let _ = reply.send(state.register_persistence(config).await);
        }
        Request::Shutdown { reply } => {
            // Intercepted by the run loop
            debug!(scope = %state.scope_key(), "Unexpected shutdown request in handler");
            let _ = reply.send(Ok(0));
        }
    }
}
