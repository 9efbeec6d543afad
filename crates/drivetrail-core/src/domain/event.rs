//! ChangeEvent domain entity
//!
//! The append-only audit trail. Every structural change observed on the
//! drive is classified into exactly one [`ChangeKind`] and recorded as a
//! [`ChangeEvent`] row, committed in the same transaction as the item
//! mutation it describes. Events are never updated or deleted.
//!
//! The nullable old/new columns are populated per kind:
//!
//! | kind   | old_name | new_name | old_parent_id | new_parent_id |
//! |--------|----------|----------|---------------|---------------|
//! | Create |          | set      |               | set if any    |
//! | Rename | set      | set      |               |               |
//! | Move   | set¹     | set¹     | set           | set           |
//! | Delete | set      |          |               |               |
//! | Update |          |          |               |               |
//!
//! ¹ both names are recorded even when only the parent changed, so a move
//! event is self-describing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic classification of an observed change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Item observed for the first time
    Create,
    /// Name changed, parent unchanged
    Rename,
    /// Parent changed (possibly together with the name)
    Move,
    /// Tombstone observed for a known live item
    Delete,
    /// Metadata-only change, or an undelete at the same name and parent
    Update,
}

impl ChangeKind {
    /// Stable string form used by the store
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Create => "create",
            ChangeKind::Rename => "rename",
            ChangeKind::Move => "move",
            ChangeKind::Delete => "delete",
            ChangeKind::Update => "update",
        }
    }

    /// Parse the stored string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(ChangeKind::Create),
            "rename" => Some(ChangeKind::Rename),
            "move" => Some(ChangeKind::Move),
            "delete" => Some(ChangeKind::Delete),
            "update" => Some(ChangeKind::Update),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One persisted audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Internal primary key, assigned by the store
    pub id: i64,
    /// Internal id of the item this event describes
    pub item_id: i64,
    /// Semantic classification
    pub kind: ChangeKind,
    pub old_name: Option<String>,
    pub new_name: Option<String>,
    pub old_parent_id: Option<i64>,
    pub new_parent_id: Option<i64>,
    /// Store-assigned insertion timestamp
    pub recorded_at: DateTime<Utc>,
}

/// The payload of an event before the store assigns id and timestamp
///
/// The item binding is separate ([`NewChangeEvent`]) because for a freshly
/// created item the internal id only exists once the insert has happened
/// inside the apply transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDetails {
    pub kind: ChangeKind,
    pub old_name: Option<String>,
    pub new_name: Option<String>,
    pub old_parent_id: Option<i64>,
    pub new_parent_id: Option<i64>,
}

impl EventDetails {
    /// First observation of an item
    #[must_use]
    pub fn created(new_name: impl Into<String>, new_parent_id: Option<i64>) -> Self {
        Self {
            kind: ChangeKind::Create,
            old_name: None,
            new_name: Some(new_name.into()),
            old_parent_id: None,
            new_parent_id,
        }
    }

    /// Name change under the same parent
    #[must_use]
    pub fn renamed(old_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Rename,
            old_name: Some(old_name.into()),
            new_name: Some(new_name.into()),
            old_parent_id: None,
            new_parent_id: None,
        }
    }

    /// Reparenting, with or without a simultaneous rename
    #[must_use]
    pub fn moved(
        old_name: impl Into<String>,
        new_name: impl Into<String>,
        old_parent_id: Option<i64>,
        new_parent_id: Option<i64>,
    ) -> Self {
        Self {
            kind: ChangeKind::Move,
            old_name: Some(old_name.into()),
            new_name: Some(new_name.into()),
            old_parent_id,
            new_parent_id,
        }
    }

    /// Tombstone for a known live item
    #[must_use]
    pub fn deleted(old_name: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Delete,
            old_name: Some(old_name.into()),
            new_name: None,
            old_parent_id: None,
            new_parent_id: None,
        }
    }

    /// Metadata-only change (or undelete in place)
    #[must_use]
    pub fn updated() -> Self {
        Self {
            kind: ChangeKind::Update,
            old_name: None,
            new_name: None,
            old_parent_id: None,
            new_parent_id: None,
        }
    }
}

/// An event bound to its item, ready for insertion
#[derive(Debug, Clone, PartialEq)]
pub struct NewChangeEvent {
    pub item_id: i64,
    pub details: EventDetails,
}

impl NewChangeEvent {
    #[must_use]
    pub fn new(item_id: i64, details: EventDetails) -> Self {
        Self { item_id, details }
    }
}
