//! # Sync State Coordinator
//!
//! Tracks whether a sync cycle is currently in flight and lets callers
//! `wait_for_complete` on it. Generalized from the upstream `SyncStatus`
//! (built for a single WebSocket-driven sync loop) to support multiple
//! independent drivers — the memo path and the shelf path both report into
//! the same cycle, and a caller waiting on completion doesn't care which
//! one is still running.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::debug;

/// A read-only snapshot of the coordinator's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStatus {
    pub is_syncing: bool,
    pub pending_count: usize,
    pub last_cycle_unix_ms: i64,
}

/// Coordinates sync cycle state across one or more drivers (memo sync,
/// shelf sync) sharing the same outbox.
pub struct SyncStateCoordinator {
    in_flight: Arc<AtomicUsize>,
    pending_count: Arc<AtomicUsize>,
    last_cycle_unix_ms: Arc<AtomicI64>,
    idle: Arc<Notify>,
}

impl SyncStateCoordinator {
    pub fn new() -> Self {
        SyncStateCoordinator {
            in_flight: Arc::new(AtomicUsize::new(0)),
            pending_count: Arc::new(AtomicUsize::new(0)),
            last_cycle_unix_ms: Arc::new(AtomicI64::new(0)),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Marks the start of a sync cycle. Returns a guard that marks
    /// completion on drop, so a driver that returns early via `?` still
    /// releases the in-flight count.
    pub fn begin_cycle(&self) -> CycleGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        CycleGuard { coordinator: self }
    }

    pub fn set_pending_count(&self, count: usize) {
        self.pending_count.store(count, Ordering::SeqCst);
    }

    pub fn record_cycle_timestamp(&self, unix_ms: i64) {
        self.last_cycle_unix_ms.store(unix_ms, Ordering::SeqCst);
    }

    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            is_syncing: self.is_syncing(),
            pending_count: self.pending_count.load(Ordering::SeqCst),
            last_cycle_unix_ms: self.last_cycle_unix_ms.load(Ordering::SeqCst),
        }
    }

    /// Waits until no cycle is in flight, or `timeout` elapses. Timeout is
    /// not an error: callers who only want a best-effort wait (e.g. a
    /// write that optimistically returned before this call) should not
    /// have to handle a spurious failure.
    pub async fn wait_for_complete(&self, timeout: Duration) -> bool {
        if !self.is_syncing() {
            return true;
        }

        let wait = self.idle.notified();
        tokio::select! {
            _ = wait => self.is_syncing_settled(),
            _ = tokio::time::sleep(timeout) => {
                debug!("wait_for_complete timed out after {:?}", timeout);
                false
            }
        }
    }

    fn is_syncing_settled(&self) -> bool {
        !self.is_syncing()
    }

    fn end_cycle(&self) {
        let remaining = self.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 {
            self.idle.notify_waiters();
        }
    }
}

impl Default for SyncStateCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by [`SyncStateCoordinator::begin_cycle`].
pub struct CycleGuard<'a> {
    coordinator: &'a SyncStateCoordinator,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.coordinator.end_cycle();
    }
}
