//! Pending signal store: per-recipient FIFO buffers and retry-broadcast tasks.
//!
//! Buffers hold signals addressed to identities with no live connection,
//! flushed in arrival order when the recipient registers. Retry tasks are
//! the recurring broadcast timers of unclaimed callers; at most one per
//! caller identity is ever tracked. The two maps share the identity key
//! space but are type-distinct on purpose: a key is either an offline
//! recipient's mailbox or a broadcasting caller's timer, never both in the
//! router's usage.

use callwire_core::ServerEvent;
use std::collections::{HashMap, VecDeque};
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Default)]
pub struct PendingSignals {
    buffers: HashMap<String, VecDeque<ServerEvent>>,
    retries: HashMap<String, JoinHandle<()>>,
}

impl PendingSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a signal for an identity that has no live connection.
    pub fn buffer(&mut self, recipient: &str, event: ServerEvent) {
        let queue = self.buffers.entry(recipient.to_string()).or_default();
        queue.push_back(event);
        debug!(recipient, queued = queue.len(), "signal buffered");
    }

    /// Drain the buffered signals for a newly registered identity, in
    /// arrival order. The buffer is empty afterwards.
    pub fn take_buffered(&mut self, recipient: &str) -> Vec<ServerEvent> {
        self.buffers
            .remove(recipient)
            .map(|q| q.into_iter().collect())
            .unwrap_or_default()
    }

    pub fn buffered_count(&self, recipient: &str) -> usize {
        self.buffers.get(recipient).map_or(0, VecDeque::len)
    }

    /// Whether a retry-broadcast task is live for this caller.
    pub fn retry_active(&self, caller: &str) -> bool {
        self.retries.contains_key(caller)
    }

    /// Track a freshly spawned retry task. Callers must check
    /// [`retry_active`](Self::retry_active) first; a stale handle being
    /// replaced here would leak a running timer.
    pub fn track_retry(&mut self, caller: &str, handle: JoinHandle<()>) {
        debug_assert!(!self.retries.contains_key(caller));
        self.retries.insert(caller.to_string(), handle);
    }

    /// Stop and forget the retry task for a caller. Idempotent; after this
    /// returns no further tick can mutate state, because ticks serialize on
    /// the relay lock held by the canceller.
    pub fn cancel_retry(&mut self, caller: &str) {
        if let Some(handle) = self.retries.remove(caller) {
            handle.abort();
            debug!(caller, "retry broadcast cancelled");
        }
    }

    /// Forget a retry handle without aborting — used by a retry task that is
    /// exiting on its own after observing a binding.
    pub fn clear_retry(&mut self, caller: &str) {
        self.retries.remove(caller);
    }

    /// Abort every outstanding retry task (process shutdown).
    pub fn cancel_all(&mut self) {
        for (_, handle) in self.retries.drain() {
            handle.abort();
        }
    }

    pub fn retry_count(&self) -> usize {
        self.retries.len()
    }
}

impl Drop for PendingSignals {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
