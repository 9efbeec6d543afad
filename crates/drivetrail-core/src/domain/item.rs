//! Item domain entity
//!
//! An [`Item`] mirrors one file or folder of the watched drive. The mirror
//! is structural only: names, parent links, and derived paths, no content.
//!
//! Items are soft-deleted. A tombstoned row stays in the store forever so
//! that historical audit events keep a valid referent, and so that a
//! re-creation at the same external id can be recognized as an undelete.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::newtypes::{DriveId, RemoteId};

/// Whether an item is a file or a folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    File,
    Folder,
}

impl ItemKind {
    /// Stable string form used by the store
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::File => "file",
            ItemKind::Folder => "folder",
        }
    }

    /// Parse the stored string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "file" => Some(ItemKind::File),
            "folder" => Some(ItemKind::Folder),
            _ => None,
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mirror of one file or folder in the watched drive
///
/// `id` is the locally assigned primary key; `external_id` is the
/// provider's identifier and is unique across the whole store, tombstones
/// included. `path` is derived from the live parent chain and is rebuilt
/// on every mutation; it is a convenience cache, never the source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Internal primary key, assigned by the store
    pub id: i64,
    /// Drive this item belongs to
    pub drive_id: DriveId,
    /// Provider-issued identifier, stable across renames and moves
    pub external_id: RemoteId,
    /// Display name (file or folder name)
    pub name: String,
    /// File or folder
    pub kind: ItemKind,
    /// Internal id of the parent item, None for root-level items
    pub parent_id: Option<i64>,
    /// Full slash-delimited path from the drive root, e.g. `/Docs/draft.txt`
    pub path: String,
    /// Creation time, provider-reported with a local fallback
    pub created_at: DateTime<Utc>,
    /// Last modification time, provider-reported with a local fallback
    pub modified_at: DateTime<Utc>,
    /// Soft-delete marker
    pub deleted: bool,
}

impl Item {
    /// Returns true if the item sits directly under the drive root
    #[must_use]
    pub fn is_root_level(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Returns true if the item is a folder
    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.kind == ItemKind::Folder
    }
}

/// Builds a full path from a parent path and an item name
///
/// The parent path is `/` for root-level items; deeper paths never carry a
/// trailing slash.
#[must_use]
pub fn join_path(parent_path: &str, name: &str) -> String {
    if parent_path == "/" || parent_path.is_empty() {
        format!("/{name}")
    } else {
        format!("{parent_path}/{name}")
    }
}
