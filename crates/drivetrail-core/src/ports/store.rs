//! State store ports (driven/secondary ports)
//!
//! Four repository traits, one per persisted relation, plus the
//! transactional [`IChangeApplier`] used by reconciliation. A single
//! adapter struct typically implements all five against one connection
//! pool.
//!
//! ## Failure semantics
//!
//! Connection-level trouble surfaces as [`StoreError::Connection`] and is
//! retryable; constraint violations and row decode failures indicate a bug
//! or a corrupted payload and abort the surrounding reconciliation pass
//! without advancing the cursor.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::cursor::DriveCursor;
use crate::domain::event::{ChangeEvent, EventDetails, NewChangeEvent};
use crate::domain::item::{Item, ItemKind};
use crate::domain::newtypes::{DeltaToken, DriveId, RemoteId};
use crate::domain::subscription::Subscription;

/// Errors surfaced by every store operation
#[derive(Debug, Error)]
pub enum StoreError {
    /// Pool exhaustion, dropped connection, disk I/O: retryable
    #[error("store connection failure: {0}")]
    Connection(String),

    /// Unique/foreign-key violation: fatal, indicates a bug upstream
    #[error("store constraint violation: {0}")]
    Constraint(String),

    /// A row that cannot be mapped back into a domain type: fatal
    #[error("store row decode failure: {0}")]
    Decode(String),
}

impl StoreError {
    /// Returns true for errors a retry loop may absorb
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Connection(_))
    }
}

/// Everything needed to insert or update one mirrored item
///
/// An upsert always writes the live representation: `deleted` is cleared,
/// so re-observing a tombstoned external id undeletes it.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemWrite {
    pub drive_id: DriveId,
    pub external_id: RemoteId,
    pub name: String,
    pub kind: ItemKind,
    pub parent_id: Option<i64>,
    /// Full path rebuilt from the live parent chain
    pub path: String,
    /// Provider-reported creation time; the store falls back to `now`
    pub created_at: Option<DateTime<Utc>>,
    /// Provider-reported modification time; the store falls back to `now`
    pub modified_at: Option<DateTime<Utc>>,
}

/// Repository for the item mirror
#[async_trait::async_trait]
pub trait IItemRepository: Send + Sync {
    /// Looks up an item by its provider id, tombstones included
    async fn find_by_external_id(
        &self,
        external_id: &RemoteId,
    ) -> Result<Option<Item>, StoreError>;

    /// Looks up an item by internal id
    async fn find_by_id(&self, id: i64) -> Result<Option<Item>, StoreError>;

    /// Inserts or updates one item, returning the stored row
    async fn upsert(&self, write: &ItemWrite) -> Result<Item, StoreError>;

    /// Sets the soft-delete flag
    async fn mark_deleted(&self, id: i64) -> Result<(), StoreError>;

    /// Live children of an item
    async fn children_of(&self, id: i64) -> Result<Vec<Item>, StoreError>;

    /// Upserts a batch inside a single transaction
    async fn bulk_upsert(&self, batch: &[ItemWrite]) -> Result<Vec<Item>, StoreError>;
}

/// Repository for the append-only audit log
#[async_trait::async_trait]
pub trait IEventRepository: Send + Sync {
    /// Appends one event; the store assigns id and timestamp
    async fn append(&self, event: &NewChangeEvent) -> Result<ChangeEvent, StoreError>;

    /// Appends a batch inside a single transaction
    async fn append_many(&self, batch: &[NewChangeEvent]) -> Result<(), StoreError>;

    /// Audit history for one item, newest first
    async fn history_of(&self, item_id: i64) -> Result<Vec<ChangeEvent>, StoreError>;
}

/// Repository for per-drive cursors
#[async_trait::async_trait]
pub trait ICursorRepository: Send + Sync {
    async fn get(&self, drive_id: &DriveId) -> Result<Option<DriveCursor>, StoreError>;

    /// Upserts the cursor and stamps `last_sync_at`
    async fn set(&self, drive_id: &DriveId, cursor: &DeltaToken) -> Result<(), StoreError>;

    /// Clears the stored cursor, forcing the next pass to be a full sync
    async fn clear(&self, drive_id: &DriveId) -> Result<(), StoreError>;
}

/// Repository for webhook subscription records
#[async_trait::async_trait]
pub trait ISubscriptionRepository: Send + Sync {
    async fn find_by_resource(&self, resource: &str) -> Result<Option<Subscription>, StoreError>;

    async fn find_by_provider_id(
        &self,
        provider_id: &str,
    ) -> Result<Option<Subscription>, StoreError>;

    /// Saves a subscription record (insert or update by provider id)
    async fn save(&self, subscription: &Subscription) -> Result<(), StoreError>;

    async fn update_expiry(
        &self,
        provider_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn delete(&self, provider_id: &str) -> Result<(), StoreError>;

    /// Records whose expiry lies before `now`, oldest first
    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>, StoreError>;

    /// Removes records whose expiry lies before `now`, returning the count
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// The atomic apply-one-item step of reconciliation
///
/// Each call commits the item mutation and its audit event in a single
/// transaction, or neither. Cursor advancement is a separate transaction
/// that the engine runs only after every item of a page has committed.
#[async_trait::async_trait]
pub trait IChangeApplier: Send + Sync {
    /// Upserts the item and, when `event` is given, appends the event bound
    /// to the (possibly freshly assigned) internal id, atomically.
    async fn apply_upsert(
        &self,
        write: &ItemWrite,
        event: Option<&EventDetails>,
    ) -> Result<Item, StoreError>;

    /// Soft-deletes the item and appends the delete event, atomically
    async fn apply_delete(&self, item_id: i64, event: &EventDetails) -> Result<(), StoreError>;
}
