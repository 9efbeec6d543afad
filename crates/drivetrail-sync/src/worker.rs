//! Reconcile worker
//!
//! Consumes jobs from the queue and delegates to the engine. Three rules
//! hold regardless of how many workers run:
//!
//! - A disabled credential gate drops the job without touching the
//!   provider, the store, or the cursor
//! - At most one reconciliation pass executes per drive at any instant
//!   (per-drive async mutex)
//! - A worker that observes an authentication failure disables the gate
//!   before returning; retryable failures re-queue the job, fatal ones
//!   drop it with the cursor untouched

use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use drivetrail_core::domain::DriveId;
use drivetrail_core::gate::CredentialGate;
use drivetrail_core::ports::queue::{ISyncQueue, SyncJob};

use crate::engine::ReconciliationEngine;

/// Shared slot holding the drive that bootstrap resolved
///
/// Jobs name a resource, not a drive; the engine wants a drive id. The
/// slot is empty until the first successful bootstrap, and a job arriving
/// before then is dropped (the gate is closed anyway).
#[derive(Debug, Default)]
pub struct DriveSlot {
    inner: RwLock<Option<DriveId>>,
}

impl DriveSlot {
    /// Creates an empty slot
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Stores the resolved drive id
    pub fn set(&self, drive_id: DriveId) {
        if let Ok(mut slot) = self.inner.write() {
            *slot = Some(drive_id);
        }
    }

    /// Returns the resolved drive id, if bootstrap has run
    #[must_use]
    pub fn get(&self) -> Option<DriveId> {
        self.inner.read().ok().and_then(|slot| slot.clone())
    }
}

/// Queue consumer driving the reconciliation engine
pub struct ReconcileWorker {
    queue: Arc<dyn ISyncQueue>,
    gate: Arc<CredentialGate>,
    engine: Arc<ReconciliationEngine>,
    drive: Arc<DriveSlot>,
    /// One async mutex per drive enforces the serialization invariant
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ReconcileWorker {
    /// Creates a worker over the shared queue, gate, engine, and drive slot
    pub fn new(
        queue: Arc<dyn ISyncQueue>,
        gate: Arc<CredentialGate>,
        engine: Arc<ReconciliationEngine>,
        drive: Arc<DriveSlot>,
    ) -> Self {
        Self {
            queue,
            gate,
            engine,
            drive,
            locks: DashMap::new(),
        }
    }

    /// Main consume loop; runs until cancellation or queue close
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("Reconcile worker starting");

        loop {
            tokio::select! {
                job = self.queue.dequeue() => {
                    match job {
                        Some(job) => self.process(job).await,
                        None => {
                            info!("Sync queue closed, worker shutting down");
                            break;
                        }
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Reconcile worker shutting down");
                    break;
                }
            }
        }
    }

    /// Handles one dequeued job
    ///
    /// The job's change type is informational only; every pass runs the
    /// full delta from the stored cursor.
    pub async fn process(&self, job: SyncJob) {
        if !self.gate.is_enabled() {
            debug!(
                subscription = %job.subscription_id,
                "Gate disabled, dropping job"
            );
            return;
        }

        let Some(drive_id) = self.drive.get() else {
            warn!(
                subscription = %job.subscription_id,
                "No drive resolved yet, dropping job"
            );
            return;
        };

        let lock = self
            .locks
            .entry(drive_id.as_str().to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _serialized = lock.lock().await;

        match self.engine.reconcile(&drive_id).await {
            Ok(outcome) => {
                info!(
                    drive = %drive_id,
                    items = outcome.items_processed,
                    changes = outcome.changes_detected,
                    "Job complete"
                );
            }
            Err(err) if err.is_auth() => {
                warn!(
                    drive = %drive_id,
                    error = %err,
                    "Credential rejected, disabling gate"
                );
                self.gate.disable();
            }
            Err(err) if err.is_retryable() => {
                warn!(drive = %drive_id, error = %err, "Retryable failure, re-queueing job");
                if self.queue.try_enqueue(job).is_err() {
                    warn!(drive = %drive_id, "Queue full, job dropped; cursor will catch up");
                }
            }
            Err(err) => {
                error!(
                    drive = %drive_id,
                    error = %err,
                    "Fatal reconciliation failure, cursor not advanced"
                );
            }
        }
    }
}
