//! Reconciliation job queue port (driven/secondary port)
//!
//! An at-least-once FIFO of opaque jobs connecting the notification sink
//! to the reconcile workers. The queue is bounded: a full queue pushes
//! back to the provider via the sink's retryable response rather than
//! buffering without limit. Losing a notification is tolerable because the
//! stored cursor, not the notification, captures the work to do.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One "go sync" hint emitted by the notification sink
///
/// `change_type` is informational only; the worker always performs a full
/// delta pass from the stored cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncJob {
    pub subscription_id: String,
    pub resource: String,
    pub change_type: String,
    pub ts: DateTime<Utc>,
}

/// Errors surfaced by queue operations
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The bounded queue is at capacity; tell the provider to retry
    #[error("sync queue is full")]
    Full,

    /// The consumer side has shut down
    #[error("sync queue is closed")]
    Closed,
}

/// Port trait for the job queue
#[async_trait::async_trait]
pub trait ISyncQueue: Send + Sync {
    /// Enqueues without blocking; [`QueueError::Full`] signals backpressure
    fn try_enqueue(&self, job: SyncJob) -> Result<(), QueueError>;

    /// Awaits the next job; `None` once the queue is closed and drained
    async fn dequeue(&self) -> Option<SyncJob>;
}
