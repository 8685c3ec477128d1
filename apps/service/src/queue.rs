use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};

/// Outcome of a bounded-wait pop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pop {
    /// An item was dequeued.
    Item(String),
    /// Nothing arrived within the wait window.
    Empty,
    /// The producer side is gone and the queue has drained.
    Closed,
}

/// Producer half of the bounded work queue.
///
/// `push` waits while the queue is at capacity; that wait is the only
/// backpressure between the schedule driver and the workers. Items are never
/// dropped or overwritten.
pub struct WorkQueue {
    tx: mpsc::Sender<String>,
}

/// Consumer half, cloned into every worker.
#[derive(Clone)]
pub struct WorkReceiver {
    rx: Arc<Mutex<mpsc::Receiver<String>>>,
}

/// Error returned by `push` once every receiver is gone.
#[derive(Debug, PartialEq, Eq)]
pub struct QueueClosed;

/// Create a FIFO queue holding at most `capacity` endpoints.
pub fn bounded(capacity: usize) -> (WorkQueue, WorkReceiver) {
    // mpsc rejects a zero capacity; a single slot keeps the contract intact.
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (WorkQueue { tx }, WorkReceiver { rx: Arc::new(Mutex::new(rx)) })
}

impl WorkQueue {
    /// Enqueue one endpoint, waiting while the queue is full.
    pub async fn push(&self, item: String) -> Result<(), QueueClosed> {
        self.tx.send(item).await.map_err(|_| QueueClosed)
    }
}

impl WorkReceiver {
    /// Dequeue with a bounded wait so the caller can re-check shutdown.
    ///
    /// The wait covers both contending with other workers for the receiver
    /// and waiting for an item, so every caller returns within `wait`.
    pub async fn pop(&self, wait: Duration) -> Pop {
        let recv = async { self.rx.lock().await.recv().await };
        match tokio::time::timeout(wait, recv).await {
            Ok(Some(item)) => Pop::Item(item),
            Ok(None) => Pop::Closed,
            Err(_) => Pop::Empty,
        }
    }
}
