//! Drivetrail Sync - Change reconciliation
//!
//! The state machine at the center of the system:
//! - [`ReconciliationEngine`] ingests delta batches, classifies each
//!   observed item against the persisted mirror, applies item and event
//!   mutations atomically, and advances the cursor only on success
//! - [`SubscriptionManager`] keeps exactly one live webhook subscription
//!   per watched resource and authenticates inbound notifications
//! - [`BoundedSyncQueue`] carries "go sync" jobs from the notification
//!   sink to the workers with backpressure
//! - [`ReconcileWorker`] consumes jobs, re-checks the credential gate,
//!   and serializes passes per drive

pub mod engine;
pub mod queue;
pub mod subscriptions;
pub mod worker;

pub use engine::{ReconcileOutcome, ReconciliationEngine, SyncError};
pub use queue::BoundedSyncQueue;
pub use subscriptions::SubscriptionManager;
pub use worker::{DriveSlot, ReconcileWorker};
