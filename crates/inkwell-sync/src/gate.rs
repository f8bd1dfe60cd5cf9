//! # Request Gate
//!
//! A pure FIFO scheduler for facade writes issued while a sync cycle is
//! already running. No reordering, no batching, no coalescing — the gate's
//! only job is to make "queue this write, run it once the in-flight sync
//! settles" a single `await` for the caller.
//!
//! Built on the same channel-plus-handle idiom used for the outbox
//! processor and inbound handler: a single task owns the queue and
//! processes jobs strictly in arrival order, so FIFO falls out of running
//! one job to completion before dequeuing the next.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::{SyncError, SyncResult};

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type Job = Box<dyn FnOnce() -> BoxFuture + Send>;

/// FIFO gate for deferred writes.
#[derive(Clone)]
pub struct RequestGate {
    sender: mpsc::UnboundedSender<Job>,
    generation: Arc<AtomicU64>,
}

impl RequestGate {
    /// Spawns the gate's processing task and returns a clonable handle to
    /// it.
    pub fn spawn() -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let generation = Arc::new(AtomicU64::new(0));

        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                job().await;
            }
        });

        RequestGate { sender, generation }
    }

    /// Enqueues `f` and returns a future that resolves once it has run (in
    /// its turn) and produced a value, or to a cancellation error if
    /// [`clear`](RequestGate::clear) was called before `f` ran.
    pub fn submit<F, Fut, T>(&self, f: F) -> impl Future<Output = SyncResult<T>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel::<T>();
        let generation = Arc::clone(&self.generation);
        let submitted_gen = generation.load(Ordering::SeqCst);

        let job: Job = Box::new(move || {
            Box::pin(async move {
                if generation.load(Ordering::SeqCst) != submitted_gen {
                    debug!("gate job cancelled before running");
                    return;
                }
                let result = f().await;
                let _ = tx.send(result);
            })
        });

        let _ = self.sender.send(job);

        async move {
            rx.await
                .map_err(|_| SyncError::ChannelError("request gate cancelled".to_string()))
        }
    }

    /// Cancels every job currently queued (including ones mid-flight
    /// through the channel buffer that haven't started running yet).
    /// Jobs already executing are unaffected.
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}
