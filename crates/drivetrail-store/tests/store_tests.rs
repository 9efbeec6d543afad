//! Integration tests for the SQLite state store
//!
//! Runs against an in-memory pool. Covers the repository contracts the
//! reconciliation engine leans on: upsert/lookup semantics, the atomic
//! apply step, cursor handling, and subscription record maintenance.

use chrono::{Duration, Utc};

use drivetrail_core::domain::{
    ChangeKind, DeltaToken, DriveId, EventDetails, ItemKind, NewChangeEvent, RemoteId,
    Subscription,
};
use drivetrail_core::ports::store::{
    IChangeApplier, ICursorRepository, IEventRepository, IItemRepository,
    ISubscriptionRepository, ItemWrite, StoreError,
};
use drivetrail_store::{DatabasePool, SqliteStateStore};

async fn setup() -> SqliteStateStore {
    let pool = DatabasePool::in_memory().await.unwrap();
    SqliteStateStore::new(pool.pool().clone())
}

#[tokio::test]
async fn test_file_backed_pool_creates_directories() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("state.db");

    let pool = DatabasePool::new(&db_path).await.unwrap();
    let store = SqliteStateStore::new(pool.pool().clone());

    // Schema is in place and writable.
    store
        .upsert(&write("ext-file", "on-disk.txt", ItemKind::File, None))
        .await
        .unwrap();
    assert!(db_path.exists());
}

fn write(external_id: &str, name: &str, kind: ItemKind, parent_id: Option<i64>) -> ItemWrite {
    let path = match parent_id {
        Some(_) => format!("/parent/{name}"),
        None => format!("/{name}"),
    };
    ItemWrite {
        drive_id: DriveId::new("drive-1").unwrap(),
        external_id: RemoteId::new(external_id).unwrap(),
        name: name.to_string(),
        kind,
        parent_id,
        path,
        created_at: None,
        modified_at: None,
    }
}

// ============================================================================
// Item repository
// ============================================================================

#[tokio::test]
async fn test_upsert_and_lookup() {
    let store = setup().await;

    let item = store
        .upsert(&write("ext-a", "Docs", ItemKind::Folder, None))
        .await
        .unwrap();
    assert!(item.id > 0);
    assert_eq!(item.name, "Docs");
    assert!(!item.deleted);

    let by_external = store
        .find_by_external_id(&RemoteId::new("ext-a").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_external.id, item.id);

    let by_id = store.find_by_id(item.id).await.unwrap().unwrap();
    assert_eq!(by_id.external_id.as_str(), "ext-a");

    assert!(store.find_by_id(9999).await.unwrap().is_none());
}

#[tokio::test]
async fn test_upsert_updates_in_place_and_preserves_created_at() {
    let store = setup().await;

    let first = store
        .upsert(&write("ext-a", "draft.txt", ItemKind::File, None))
        .await
        .unwrap();

    let mut renamed = write("ext-a", "draft-v2.txt", ItemKind::File, None);
    renamed.modified_at = Some(Utc::now() + Duration::seconds(5));
    let second = store.upsert(&renamed).await.unwrap();

    // Same row, new name, original creation time.
    assert_eq!(second.id, first.id);
    assert_eq!(second.name, "draft-v2.txt");
    assert_eq!(second.created_at, first.created_at);
}

#[tokio::test]
async fn test_upsert_clears_deleted_flag() {
    let store = setup().await;

    let item = store
        .upsert(&write("ext-a", "ghost.txt", ItemKind::File, None))
        .await
        .unwrap();
    store.mark_deleted(item.id).await.unwrap();

    let tombstone = store.find_by_id(item.id).await.unwrap().unwrap();
    assert!(tombstone.deleted);

    // Re-observing the same external id undeletes the row.
    let revived = store
        .upsert(&write("ext-a", "ghost.txt", ItemKind::File, None))
        .await
        .unwrap();
    assert_eq!(revived.id, item.id);
    assert!(!revived.deleted);
}

#[tokio::test]
async fn test_children_of_excludes_deleted() {
    let store = setup().await;

    let parent = store
        .upsert(&write("ext-p", "Docs", ItemKind::Folder, None))
        .await
        .unwrap();
    let child_a = store
        .upsert(&write("ext-a", "a.txt", ItemKind::File, Some(parent.id)))
        .await
        .unwrap();
    let _child_b = store
        .upsert(&write("ext-b", "b.txt", ItemKind::File, Some(parent.id)))
        .await
        .unwrap();

    store.mark_deleted(child_a.id).await.unwrap();

    let children = store.children_of(parent.id).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].name, "b.txt");
}

#[tokio::test]
async fn test_bulk_upsert() {
    let store = setup().await;

    let batch = vec![
        write("ext-1", "one.txt", ItemKind::File, None),
        write("ext-2", "two.txt", ItemKind::File, None),
        write("ext-3", "three.txt", ItemKind::File, None),
    ];

    let items = store.bulk_upsert(&batch).await.unwrap();
    assert_eq!(items.len(), 3);
    assert!(store
        .find_by_external_id(&RemoteId::new("ext-2").unwrap())
        .await
        .unwrap()
        .is_some());
}

// ============================================================================
// Event repository
// ============================================================================

#[tokio::test]
async fn test_append_and_history_order() {
    let store = setup().await;

    let item = store
        .upsert(&write("ext-a", "draft.txt", ItemKind::File, None))
        .await
        .unwrap();

    store
        .append(&NewChangeEvent::new(
            item.id,
            EventDetails::created("draft.txt", None),
        ))
        .await
        .unwrap();
    store
        .append(&NewChangeEvent::new(
            item.id,
            EventDetails::renamed("draft.txt", "draft-v2.txt"),
        ))
        .await
        .unwrap();

    let history = store.history_of(item.id).await.unwrap();
    assert_eq!(history.len(), 2);
    // Newest first; insertion id breaks timestamp ties.
    assert_eq!(history[0].kind, ChangeKind::Rename);
    assert_eq!(history[1].kind, ChangeKind::Create);
}

#[tokio::test]
async fn test_append_many_is_all_or_nothing() {
    let store = setup().await;

    let item = store
        .upsert(&write("ext-a", "draft.txt", ItemKind::File, None))
        .await
        .unwrap();

    // Second entry references a nonexistent item; the whole batch rolls
    // back.
    let batch = vec![
        NewChangeEvent::new(item.id, EventDetails::updated()),
        NewChangeEvent::new(777, EventDetails::updated()),
    ];
    let err = store.append_many(&batch).await.unwrap_err();
    assert!(matches!(err, StoreError::Constraint(_)));
    assert!(store.history_of(item.id).await.unwrap().is_empty());

    // A clean batch commits as one unit.
    let batch = vec![
        NewChangeEvent::new(item.id, EventDetails::updated()),
        NewChangeEvent::new(item.id, EventDetails::renamed("draft.txt", "draft-v2.txt")),
    ];
    store.append_many(&batch).await.unwrap();
    assert_eq!(store.history_of(item.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_append_for_unknown_item_is_constraint_violation() {
    let store = setup().await;

    let err = store
        .append(&NewChangeEvent::new(42, EventDetails::updated()))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Constraint(_)));
    assert!(!err.is_retryable());
}

// ============================================================================
// Atomic apply
// ============================================================================

#[tokio::test]
async fn test_apply_upsert_commits_item_and_event_together() {
    let store = setup().await;

    let item = store
        .apply_upsert(
            &write("ext-a", "Docs", ItemKind::Folder, None),
            Some(&EventDetails::created("Docs", None)),
        )
        .await
        .unwrap();

    let history = store.history_of(item.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, ChangeKind::Create);
    assert_eq!(history[0].new_name.as_deref(), Some("Docs"));
}

#[tokio::test]
async fn test_apply_upsert_without_event_writes_no_history() {
    let store = setup().await;

    let item = store
        .apply_upsert(&write("ext-a", "Docs", ItemKind::Folder, None), None)
        .await
        .unwrap();

    assert!(store.history_of(item.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_apply_delete_marks_and_records() {
    let store = setup().await;

    let item = store
        .apply_upsert(
            &write("ext-a", "notes.txt", ItemKind::File, None),
            Some(&EventDetails::created("notes.txt", None)),
        )
        .await
        .unwrap();

    store
        .apply_delete(item.id, &EventDetails::deleted("notes.txt"))
        .await
        .unwrap();

    let row = store.find_by_id(item.id).await.unwrap().unwrap();
    assert!(row.deleted);

    let history = store.history_of(item.id).await.unwrap();
    assert_eq!(history[0].kind, ChangeKind::Delete);
    assert_eq!(history[0].old_name.as_deref(), Some("notes.txt"));
}

// ============================================================================
// Cursor repository
// ============================================================================

#[tokio::test]
async fn test_cursor_roundtrip() {
    let store = setup().await;
    let drive = DriveId::new("drive-1").unwrap();

    assert!(store.get(&drive).await.unwrap().is_none());

    store
        .set(&drive, &DeltaToken::new("C1").unwrap())
        .await
        .unwrap();

    let cursor = store.get(&drive).await.unwrap().unwrap();
    assert_eq!(cursor.cursor.as_ref().unwrap().as_str(), "C1");
    assert!(cursor.last_sync_at.is_some());
    assert!(!cursor.requires_full_sync());

    store
        .set(&drive, &DeltaToken::new("C2").unwrap())
        .await
        .unwrap();
    let cursor = store.get(&drive).await.unwrap().unwrap();
    assert_eq!(cursor.cursor.as_ref().unwrap().as_str(), "C2");
}

#[tokio::test]
async fn test_cursor_clear_forces_full_sync() {
    let store = setup().await;
    let drive = DriveId::new("drive-1").unwrap();

    store
        .set(&drive, &DeltaToken::new("C1").unwrap())
        .await
        .unwrap();
    store.clear(&drive).await.unwrap();

    let cursor = store.get(&drive).await.unwrap().unwrap();
    assert!(cursor.requires_full_sync());

    // Clearing a drive that has no row is a no-op, not an error.
    store
        .clear(&DriveId::new("drive-unknown").unwrap())
        .await
        .unwrap();
}

// ============================================================================
// Subscription repository
// ============================================================================

fn subscription(provider_id: &str, resource: &str, expires_in_hours: i64) -> Subscription {
    let now = Utc::now();
    Subscription {
        provider_id: provider_id.to_string(),
        resource: resource.to_string(),
        client_state: "c".repeat(64),
        expires_at: now + Duration::hours(expires_in_hours),
        created_at: now,
    }
}

#[tokio::test]
async fn test_subscription_upsert_and_lookup() {
    let store = setup().await;
    let sub = subscription("sub-1", "/me/drive/root", 70);

    store.save(&sub).await.unwrap();

    let by_resource = store
        .find_by_resource("/me/drive/root")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_resource.provider_id, "sub-1");

    let by_id = store.find_by_provider_id("sub-1").await.unwrap().unwrap();
    assert_eq!(by_id.client_state, sub.client_state);

    assert!(store.find_by_provider_id("sub-x").await.unwrap().is_none());
}

#[tokio::test]
async fn test_find_by_resource_returns_newest() {
    let store = setup().await;

    let mut old = subscription("sub-old", "/me/drive/root", 70);
    old.created_at = Utc::now() - Duration::hours(48);
    store.save(&old).await.unwrap();
    store
        .save(&subscription("sub-new", "/me/drive/root", 70))
        .await
        .unwrap();

    let live = store
        .find_by_resource("/me/drive/root")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(live.provider_id, "sub-new");
}

#[tokio::test]
async fn test_update_expiry() {
    let store = setup().await;
    let sub = subscription("sub-1", "/me/drive/root", 10);
    store.save(&sub).await.unwrap();

    let extended = Utc::now() + Duration::hours(70);
    store.update_expiry("sub-1", extended).await.unwrap();

    let row = store.find_by_provider_id("sub-1").await.unwrap().unwrap();
    assert!(row.expires_at > sub.expires_at);
}

#[tokio::test]
async fn test_expired_listing_and_cleanup() {
    let store = setup().await;
    let now = Utc::now();

    store
        .save(&subscription("sub-live", "/res/a", 70))
        .await
        .unwrap();
    store
        .save(&subscription("sub-dead", "/res/b", -2))
        .await
        .unwrap();

    let expired = store.list_expired(now).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].provider_id, "sub-dead");

    let removed = store.delete_expired(now).await.unwrap();
    assert_eq!(removed, 1);
    assert!(store.find_by_provider_id("sub-dead").await.unwrap().is_none());
    assert!(store.find_by_provider_id("sub-live").await.unwrap().is_some());
}
