//! Change reconciliation engine
//!
//! The [`ReconciliationEngine`] consumes a drive's delta feed and folds it
//! into the mirror:
//!
//! 1. Read the stored cursor for the drive
//! 2. Drain the delta feed from that cursor
//! 3. Classify-and-apply every observed item, each in its own transaction
//! 4. Advance the cursor only when the whole batch committed
//!
//! ## Classification
//!
//! Each observed item is compared against the persisted row for its
//! external id. Tombstones soft-delete known live items; live observations
//! are classified by which of (name, parent) changed, with a parent change
//! dominating a simultaneous name change:
//!
//! | name changed | parent changed | event  |
//! |:---:|:---:|--------|
//! |  no |  no | UPDATE when modified-at moved, otherwise nothing |
//! | yes |  no | RENAME |
//! |  no | yes | MOVE   |
//! | yes | yes | MOVE   |
//!
//! Replaying a page is safe: the second pass classifies every item as
//! unchanged and writes nothing, so the cursor advance is idempotent.
//!
//! ## Ordering
//!
//! Items apply in provider order. A live item whose parent is not yet
//! known is deferred once and replayed after the rest of the batch;
//! parents arriving after children is an ordering anomaly the replay
//! absorbs. If the parent never shows up the item is mirrored at the
//! root with a resolution warning and re-links on its next observation.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use drivetrail_core::domain::{DriveId, EventDetails, Item, ItemKind, RemoteId};
use drivetrail_core::ports::provider::{GatewayError, IProviderGateway, RemoteChange};
use drivetrail_core::ports::store::{
    IChangeApplier, ICursorRepository, IItemRepository, ItemWrite, StoreError,
};

/// Summary of a completed reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Number of delta entries consumed
    pub items_processed: usize,
    /// Number of entries that produced a state mutation and an event
    pub changes_detected: usize,
}

/// Errors that abort a reconciliation pass
///
/// Whatever the variant, the cursor is untouched: a retry re-runs the
/// same page and the already-committed items classify as unchanged.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("gateway failure: {0}")]
    Gateway(#[from] GatewayError),

    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    /// The parent chain loops back on itself. Real drives never produce
    /// this; a cycle means corrupted state and is fatal.
    #[error("parent chain cycle detected at item {external_id}")]
    CycleDetected { external_id: String },

    /// Structurally unusable provider payload
    #[error("malformed provider payload: {0}")]
    Payload(String),
}

impl SyncError {
    /// Returns true for errors a re-queued job may retry
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Gateway(err) => err.is_retryable(),
            SyncError::Store(err) => err.is_retryable(),
            SyncError::CycleDetected { .. } | SyncError::Payload(_) => false,
        }
    }

    /// Returns true when the bearer credential is the problem
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, SyncError::Gateway(err) if err.is_auth())
    }
}

// ============================================================================
// Classification
// ============================================================================

/// What a live observation against known state turns into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    /// Nothing changed; write nothing
    Skip,
    /// Metadata moved, or an undelete in place
    Update,
    /// Name changed under the same parent
    Rename,
    /// Parent changed, name change folded in
    Move,
}

/// Decides the event kind for a live observation of a known item
///
/// Pure function of the before-state and the observation, so identical
/// inputs always yield the same event kind.
fn classify(
    prev: &Item,
    new_name: &str,
    new_parent_id: Option<i64>,
    modified: Option<chrono::DateTime<chrono::Utc>>,
    metadata_updates: bool,
) -> Decision {
    let name_changed = new_name != prev.name;
    let parent_changed = new_parent_id != prev.parent_id;

    match (name_changed, parent_changed) {
        (false, false) => {
            if prev.deleted {
                // Undelete at the same name and parent. Recorded even
                // with metadata updates off, or the flag would never
                // clear.
                Decision::Update
            } else if metadata_updates && modified.is_some_and(|m| m != prev.modified_at) {
                Decision::Update
            } else {
                Decision::Skip
            }
        }
        (true, false) => Decision::Rename,
        // Parent change dominates a simultaneous name change.
        (_, true) => Decision::Move,
    }
}

/// What applying one delta entry did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    Mutated,
    Skipped,
    /// Parent unknown; retry after the rest of the batch
    Deferred,
}

// ============================================================================
// ReconciliationEngine
// ============================================================================

/// Folds delta batches into the mirror and the audit log
///
/// ## Dependencies
///
/// - `gateway`: delta feed access, retries already absorbed
/// - `items`: mirror lookups
/// - `applier`: the atomic item-plus-event apply step
/// - `cursors`: per-drive cursor persistence
pub struct ReconciliationEngine {
    gateway: Arc<dyn IProviderGateway>,
    items: Arc<dyn IItemRepository>,
    applier: Arc<dyn IChangeApplier>,
    cursors: Arc<dyn ICursorRepository>,
    /// Whether metadata-only changes (modified-at moved, nothing else)
    /// produce UPDATE events or are skipped silently
    metadata_updates: bool,
}

impl ReconciliationEngine {
    /// Creates a new engine over the given ports
    ///
    /// Metadata-only UPDATE events are on by default; see
    /// [`with_metadata_updates`](Self::with_metadata_updates).
    pub fn new(
        gateway: Arc<dyn IProviderGateway>,
        items: Arc<dyn IItemRepository>,
        applier: Arc<dyn IChangeApplier>,
        cursors: Arc<dyn ICursorRepository>,
    ) -> Self {
        Self {
            gateway,
            items,
            applier,
            cursors,
            metadata_updates: true,
        }
    }

    /// Sets whether a bare modified-at change produces an UPDATE event
    pub fn with_metadata_updates(mut self, enabled: bool) -> Self {
        self.metadata_updates = enabled;
        self
    }

    /// Runs one reconciliation pass for a drive
    ///
    /// The cursor advances only if every item of the batch committed; any
    /// error leaves it where it was, so a re-queued job re-runs the same
    /// page.
    pub async fn reconcile(&self, drive_id: &DriveId) -> Result<ReconcileOutcome, SyncError> {
        let cursor = self
            .cursors
            .get(drive_id)
            .await?
            .and_then(|row| row.cursor);

        debug!(drive = %drive_id, full_sync = cursor.is_none(), "Starting reconciliation pass");

        let batch = self.gateway.delta_complete(drive_id, cursor.as_ref()).await?;

        let items_processed = batch.changes.len();
        let mut changes_detected = 0;
        let mut pending: Vec<&RemoteChange> = Vec::new();

        for change in &batch.changes {
            match self.apply_change(drive_id, change, true).await? {
                Applied::Mutated => changes_detected += 1,
                Applied::Skipped => {}
                Applied::Deferred => pending.push(change),
            }
        }

        // Single replay of entries whose parent had not arrived yet.
        for change in pending {
            match self.apply_change(drive_id, change, false).await? {
                Applied::Mutated => changes_detected += 1,
                Applied::Skipped | Applied::Deferred => {}
            }
        }

        self.cursors.set(drive_id, &batch.cursor).await?;

        info!(
            drive = %drive_id,
            items_processed,
            changes_detected,
            cursor = batch.cursor.as_str(),
            "Reconciliation pass complete"
        );

        Ok(ReconcileOutcome {
            items_processed,
            changes_detected,
        })
    }

    /// Clears the cursor and runs a full pass
    ///
    /// The first pass after a clear emits CREATE events for every item the
    /// provider enumerates.
    pub async fn initial_sync(&self, drive_id: &DriveId) -> Result<ReconcileOutcome, SyncError> {
        info!(drive = %drive_id, "Forcing full sync");
        self.cursors.clear(drive_id).await?;
        self.reconcile(drive_id).await
    }

    // ========================================================================
    // Classify-and-apply for a single item
    // ========================================================================

    async fn apply_change(
        &self,
        drive_id: &DriveId,
        obs: &RemoteChange,
        allow_defer: bool,
    ) -> Result<Applied, SyncError> {
        let external_id = RemoteId::new(&obs.external_id)
            .map_err(|e| SyncError::Payload(format!("unusable item id: {e}")))?;

        let prev = self.items.find_by_external_id(&external_id).await?;

        if obs.is_deleted {
            return self.apply_tombstone(prev).await;
        }

        // Missing name on a live item is a soft payload defect: skip the
        // entry, keep the pass going.
        if obs.name.is_empty() {
            warn!(item = %external_id, "Live delta entry without a name, skipping");
            return Ok(Applied::Skipped);
        }

        // Resolve the parent. Unknown parents get one deferral; after the
        // replay the item lands at the root and re-links on its next
        // observed mutation.
        let new_parent_id = match &obs.parent_external_id {
            None => None,
            Some(parent_ext) => {
                let parent_id = RemoteId::new(parent_ext)
                    .map_err(|e| SyncError::Payload(format!("unusable parent id: {e}")))?;
                match self.items.find_by_external_id(&parent_id).await? {
                    Some(parent) => Some(parent.id),
                    None if allow_defer => {
                        debug!(item = %external_id, parent = %parent_id, "Parent unknown, deferring");
                        return Ok(Applied::Deferred);
                    }
                    None => {
                        warn!(
                            item = %external_id,
                            parent = %parent_id,
                            "Parent unresolved after replay, mirroring at root"
                        );
                        None
                    }
                }
            }
        };

        let path = self
            .build_path(new_parent_id, &obs.name, &obs.external_id)
            .await?;

        let kind = if obs.is_folder {
            ItemKind::Folder
        } else {
            ItemKind::File
        };

        let write = ItemWrite {
            drive_id: drive_id.clone(),
            external_id,
            name: obs.name.clone(),
            kind,
            parent_id: new_parent_id,
            path,
            created_at: obs.created,
            modified_at: obs.modified,
        };

        let details = match &prev {
            None => EventDetails::created(&obs.name, new_parent_id),
            Some(prev) => match classify(
                prev,
                &obs.name,
                new_parent_id,
                obs.modified,
                self.metadata_updates,
            ) {
                Decision::Skip => return Ok(Applied::Skipped),
                Decision::Update => EventDetails::updated(),
                Decision::Rename => EventDetails::renamed(&prev.name, &obs.name),
                Decision::Move => {
                    EventDetails::moved(&prev.name, &obs.name, prev.parent_id, new_parent_id)
                }
            },
        };

        debug!(
            item = write.external_id.as_str(),
            event = %details.kind,
            path = %write.path,
            "Applying change"
        );

        self.applier.apply_upsert(&write, Some(&details)).await?;
        Ok(Applied::Mutated)
    }

    /// Tombstone branch: soft-delete known live items, ignore the rest
    async fn apply_tombstone(&self, prev: Option<Item>) -> Result<Applied, SyncError> {
        match prev {
            None => Ok(Applied::Skipped),
            Some(item) if item.deleted => Ok(Applied::Skipped),
            Some(item) => {
                self.applier
                    .apply_delete(item.id, &EventDetails::deleted(&item.name))
                    .await?;
                Ok(Applied::Mutated)
            }
        }
    }

    /// Builds the full path by walking the parent chain upward
    ///
    /// Drives are trees, so the walk must terminate; a revisited id means
    /// the stored state is corrupt and the pass dies rather than loops.
    async fn build_path(
        &self,
        parent_id: Option<i64>,
        name: &str,
        external_id: &str,
    ) -> Result<String, SyncError> {
        let mut segments = vec![name.to_string()];
        let mut cursor = parent_id;
        let mut visited: HashSet<i64> = HashSet::new();

        while let Some(id) = cursor {
            if !visited.insert(id) {
                return Err(SyncError::CycleDetected {
                    external_id: external_id.to_string(),
                });
            }
            let node = self.items.find_by_id(id).await?.ok_or_else(|| {
                SyncError::Payload(format!("parent chain references missing item {id}"))
            })?;
            segments.push(node.name);
            cursor = node.parent_id;
        }

        segments.reverse();
        Ok(format!("/{}", segments.join("/")))
    }
}
