//! Per-drive delta cursor state
//!
//! A [`DriveCursor`] records how far the delta feed for one drive has been
//! consumed. The cursor advances only after every item of a pass has
//! committed; clearing it forces the next pass to be a full sync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{DeltaToken, DriveId};

/// Incremental sync position for one drive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveCursor {
    /// Drive this cursor belongs to, unique in the store
    pub drive_id: DriveId,
    /// Opaque continuation token, None when the next pass is a full sync
    pub cursor: Option<DeltaToken>,
    /// When the last successful pass finished
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl DriveCursor {
    /// Returns true when no usable cursor is stored
    #[must_use]
    pub fn requires_full_sync(&self) -> bool {
        self.cursor.is_none()
    }
}
