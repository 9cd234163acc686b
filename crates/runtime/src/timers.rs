//! Debounce timers — cancellable delayed flushes keyed by path.
//!
//! Scheduling a path replaces any pending timer for it, so a burst of
//! writes produces a single flush. A fired timer does not flush anything
//! itself; it posts an [`Expired`] notice back to the owning server, which
//! claims it with [`DebounceTimers::take_expired`]. The token guards against
//! a notice that was already in flight when its timer got replaced.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Notice that a path's debounce period elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expired {
    pub path: String,
    pub token: u64,
}

struct PendingFlush {
    token: u64,
    handle: JoinHandle<()>,
}

pub struct DebounceTimers {
    pending: HashMap<String, PendingFlush>,
    next_token: u64,
    expired_tx: mpsc::UnboundedSender<Expired>,
}

impl DebounceTimers {
    /// Timers plus the receiver their expiry notices arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Expired>) {
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        let timers = Self {
            pending: HashMap::new(),
            next_token: 0,
            expired_tx,
        };
        (timers, expired_rx)
    }

    /// (Re)start the timer for `path`. Must be called inside a tokio runtime.
    pub fn schedule(&mut self, path: &str, delay: Duration) -> u64 {
        self.cancel(path);

        self.next_token += 1;
        let token = self.next_token;
        let tx = self.expired_tx.clone();
        let notice = Expired {
            path: path.to_string(),
            token,
        };

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the server already stopped
            let _ = tx.send(notice);
        });

        self.pending.insert(path.to_string(), PendingFlush { token, handle });
        token
    }

    /// Cancel the pending timer for `path`. Returns whether one existed.
    pub fn cancel(&mut self, path: &str) -> bool {
        match self.pending.remove(path) {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.handle.abort();
        }
    }

    /// Claim a fired timer. False for notices superseded by a newer
    /// schedule or a cancellation.
    pub fn take_expired(&mut self, expired: &Expired) -> bool {
        match self.pending.get(&expired.path) {
            Some(pending) if pending.token == expired.token => {
                self.pending.remove(&expired.path);
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self, path: &str) -> bool {
        self.pending.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Drop for DebounceTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
