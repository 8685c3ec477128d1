use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tracing::info;

/// Single-writer handle that flips the process-wide shutdown flag.
///
/// Exactly one of these exists, owned by the top-level supervisor. Every
/// other loop holds a [`Shutdown`] and only ever reads the flag.
pub struct ShutdownCoordinator {
    fired: AtomicBool,
    tx: watch::Sender<bool>,
}

/// Read side of the shutdown flag, observed cooperatively by every loop.
#[derive(Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

pub fn coordinator() -> (ShutdownCoordinator, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownCoordinator { fired: AtomicBool::new(false), tx }, Shutdown { rx })
}

impl ShutdownCoordinator {
    /// Set the flag. Only the first call has any effect; later calls are
    /// ignored so racing signals cannot produce duplicate shutdown sequences.
    pub fn trigger(&self, reason: &str) {
        if self.fired.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("shutdown initiated: {reason}");
        let _ = self.tx.send(true);
    }
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}
