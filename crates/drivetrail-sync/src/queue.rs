//! Bounded in-process job queue
//!
//! The default [`ISyncQueue`] implementation: a tokio mpsc channel with a
//! fixed capacity. `try_enqueue` never blocks; a full channel surfaces as
//! [`QueueError::Full`], which the notification sink translates into a
//! retryable response for the provider.

use tokio::sync::mpsc;
use tokio::sync::Mutex;

use drivetrail_core::ports::queue::{ISyncQueue, QueueError, SyncJob};

/// Bounded FIFO over a tokio mpsc channel
///
/// The receiver lives behind an async mutex so multiple workers can share
/// one queue; each job is delivered to exactly one of them.
pub struct BoundedSyncQueue {
    tx: mpsc::Sender<SyncJob>,
    rx: Mutex<mpsc::Receiver<SyncJob>>,
}

impl BoundedSyncQueue {
    /// Creates a queue holding at most `capacity` undelivered jobs
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }
}

#[async_trait::async_trait]
impl ISyncQueue for BoundedSyncQueue {
    fn try_enqueue(&self, job: SyncJob) -> Result<(), QueueError> {
        self.tx.try_send(job).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    async fn dequeue(&self) -> Option<SyncJob> {
        self.rx.lock().await.recv().await
    }
}
