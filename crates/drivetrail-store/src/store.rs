//! SQLite implementation of the state store ports
//!
//! One struct, [`SqliteStateStore`], implements all five port traits
//! against a shared connection pool. Domain types map to SQL as follows:
//!
//! | Domain Type       | SQL Type | Strategy                                |
//! |-------------------|----------|-----------------------------------------|
//! | DriveId, RemoteId | TEXT     | string via `.as_str()` / `::new()`      |
//! | DeltaToken        | TEXT     | string via `.as_str()` / `::new()`      |
//! | ItemKind          | TEXT     | `as_str()` / `parse()`                  |
//! | ChangeKind        | TEXT     | `as_str()` / `parse()`                  |
//! | DateTime<Utc>     | TEXT     | ISO 8601 via `to_rfc3339()`             |
//! | deleted flag      | INTEGER  | 0 / 1                                   |
//!
//! The transactional paths (`apply_upsert`, `apply_delete`, `bulk_upsert`,
//! `append_many`) run on a single connection inside `BEGIN`/`COMMIT`;
//! everything else executes directly against the pool.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use drivetrail_core::domain::{
    ChangeEvent, ChangeKind, DriveCursor, DeltaToken, DriveId, EventDetails, Item, ItemKind,
    NewChangeEvent, RemoteId, Subscription,
};
use drivetrail_core::ports::store::{
    IChangeApplier, ICursorRepository, IEventRepository, IItemRepository,
    ISubscriptionRepository, ItemWrite, StoreError,
};

/// SQLite-based implementation of the state store ports
///
/// All operations go through a connection pool; transactional paths pin a
/// single connection for the duration of the transaction.
#[derive(Clone)]
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    /// Creates a new store instance over the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Error and type conversion helpers
// ============================================================================

/// Maps a sqlx error into the port-level taxonomy
///
/// Constraint violations are fatal (they indicate a bug or a corrupted
/// payload); everything connection-shaped is retryable.
fn map_sqlx(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) => match db.kind() {
            sqlx::error::ErrorKind::UniqueViolation
            | sqlx::error::ErrorKind::ForeignKeyViolation
            | sqlx::error::ErrorKind::NotNullViolation
            | sqlx::error::ErrorKind::CheckViolation => StoreError::Constraint(db.to_string()),
            _ => StoreError::Connection(err.to_string()),
        },
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. } => StoreError::Decode(err.to_string()),
        _ => StoreError::Connection(err.to_string()),
    }
}

/// Parses a DateTime<Utc> from its stored ISO 8601 form
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Decode(format!("failed to parse datetime '{s}': {e}")))
}

/// Parses an optional DateTime<Utc> from an optional string
fn parse_optional_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    match s {
        Some(ref val) if !val.is_empty() => parse_datetime(val).map(Some),
        _ => Ok(None),
    }
}

fn get_column<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get::<T, _>(column).map_err(map_sqlx)
}

// ============================================================================
// Row mapping functions
// ============================================================================

fn item_from_row(row: &SqliteRow) -> Result<Item, StoreError> {
    let drive_id_str: String = get_column(row, "drive_id")?;
    let external_id_str: String = get_column(row, "external_id")?;
    let kind_str: String = get_column(row, "kind")?;
    let created_at_str: String = get_column(row, "created_at")?;
    let modified_at_str: String = get_column(row, "modified_at")?;
    let deleted_flag: i64 = get_column(row, "deleted")?;

    let drive_id = DriveId::new(drive_id_str)
        .map_err(|e| StoreError::Decode(format!("invalid drive_id: {e}")))?;
    let external_id = RemoteId::new(external_id_str)
        .map_err(|e| StoreError::Decode(format!("invalid external_id: {e}")))?;
    let kind = ItemKind::parse(&kind_str)
        .ok_or_else(|| StoreError::Decode(format!("unknown item kind: {kind_str}")))?;

    Ok(Item {
        id: get_column(row, "id")?,
        drive_id,
        external_id,
        name: get_column(row, "name")?,
        kind,
        parent_id: get_column(row, "parent_id")?,
        path: get_column(row, "path")?,
        created_at: parse_datetime(&created_at_str)?,
        modified_at: parse_datetime(&modified_at_str)?,
        deleted: deleted_flag != 0,
    })
}

fn event_from_row(row: &SqliteRow) -> Result<ChangeEvent, StoreError> {
    let kind_str: String = get_column(row, "kind")?;
    let recorded_at_str: String = get_column(row, "recorded_at")?;

    let kind = ChangeKind::parse(&kind_str)
        .ok_or_else(|| StoreError::Decode(format!("unknown event kind: {kind_str}")))?;

    Ok(ChangeEvent {
        id: get_column(row, "id")?,
        item_id: get_column(row, "item_id")?,
        kind,
        old_name: get_column(row, "old_name")?,
        new_name: get_column(row, "new_name")?,
        old_parent_id: get_column(row, "old_parent_id")?,
        new_parent_id: get_column(row, "new_parent_id")?,
        recorded_at: parse_datetime(&recorded_at_str)?,
    })
}

fn subscription_from_row(row: &SqliteRow) -> Result<Subscription, StoreError> {
    let expires_at_str: String = get_column(row, "expires_at")?;
    let created_at_str: String = get_column(row, "created_at")?;

    Ok(Subscription {
        provider_id: get_column(row, "provider_id")?,
        resource: get_column(row, "resource")?,
        client_state: get_column(row, "client_state")?,
        expires_at: parse_datetime(&expires_at_str)?,
        created_at: parse_datetime(&created_at_str)?,
    })
}

// ============================================================================
// Connection-level write helpers (shared by pool and transaction paths)
// ============================================================================

async fn upsert_on(conn: &mut SqliteConnection, write: &ItemWrite) -> Result<Item, StoreError> {
    let now = Utc::now();
    let created_at = write.created_at.unwrap_or(now);
    let modified_at = write.modified_at.unwrap_or(now);

    sqlx::query(
        r#"
        INSERT INTO items (drive_id, external_id, name, kind, parent_id, path,
                           created_at, modified_at, deleted)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0)
        ON CONFLICT(external_id) DO UPDATE SET
            name = excluded.name,
            kind = excluded.kind,
            parent_id = excluded.parent_id,
            path = excluded.path,
            modified_at = excluded.modified_at,
            deleted = 0
        "#,
    )
    .bind(write.drive_id.as_str())
    .bind(write.external_id.as_str())
    .bind(&write.name)
    .bind(write.kind.as_str())
    .bind(write.parent_id)
    .bind(&write.path)
    .bind(created_at.to_rfc3339())
    .bind(modified_at.to_rfc3339())
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx)?;

    let row = sqlx::query("SELECT * FROM items WHERE external_id = ?")
        .bind(write.external_id.as_str())
        .fetch_one(&mut *conn)
        .await
        .map_err(map_sqlx)?;

    item_from_row(&row)
}

async fn mark_deleted_on(conn: &mut SqliteConnection, id: i64) -> Result<(), StoreError> {
    sqlx::query("UPDATE items SET deleted = 1 WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await
        .map_err(map_sqlx)?;
    Ok(())
}

async fn append_on(
    conn: &mut SqliteConnection,
    item_id: i64,
    details: &EventDetails,
) -> Result<ChangeEvent, StoreError> {
    let recorded_at = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO change_events (item_id, kind, old_name, new_name,
                                   old_parent_id, new_parent_id, recorded_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(item_id)
    .bind(details.kind.as_str())
    .bind(&details.old_name)
    .bind(&details.new_name)
    .bind(details.old_parent_id)
    .bind(details.new_parent_id)
    .bind(recorded_at.to_rfc3339())
    .execute(conn)
    .await
    .map_err(map_sqlx)?;

    Ok(ChangeEvent {
        id: result.last_insert_rowid(),
        item_id,
        kind: details.kind,
        old_name: details.old_name.clone(),
        new_name: details.new_name.clone(),
        old_parent_id: details.old_parent_id,
        new_parent_id: details.new_parent_id,
        recorded_at,
    })
}

// ============================================================================
// IItemRepository
// ============================================================================

#[async_trait::async_trait]
impl IItemRepository for SqliteStateStore {
    async fn find_by_external_id(
        &self,
        external_id: &RemoteId,
    ) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query("SELECT * FROM items WHERE external_id = ?")
            .bind(external_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        row.as_ref().map(item_from_row).transpose()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query("SELECT * FROM items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        row.as_ref().map(item_from_row).transpose()
    }

    async fn upsert(&self, write: &ItemWrite) -> Result<Item, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx)?;
        upsert_on(&mut conn, write).await
    }

    async fn mark_deleted(&self, id: i64) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx)?;
        mark_deleted_on(&mut conn, id).await
    }

    async fn children_of(&self, id: i64) -> Result<Vec<Item>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM items WHERE parent_id = ? AND deleted = 0 ORDER BY name",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.iter().map(item_from_row).collect()
    }

    async fn bulk_upsert(&self, batch: &[ItemWrite]) -> Result<Vec<Item>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let mut items = Vec::with_capacity(batch.len());
        for write in batch {
            items.push(upsert_on(&mut tx, write).await?);
        }

        tx.commit().await.map_err(map_sqlx)?;
        Ok(items)
    }
}

// ============================================================================
// IEventRepository
// ============================================================================

#[async_trait::async_trait]
impl IEventRepository for SqliteStateStore {
    async fn append(&self, event: &NewChangeEvent) -> Result<ChangeEvent, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx)?;
        append_on(&mut conn, event.item_id, &event.details).await
    }

    async fn append_many(&self, batch: &[NewChangeEvent]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        for event in batch {
            append_on(&mut tx, event.item_id, &event.details).await?;
        }

        tx.commit().await.map_err(map_sqlx)
    }

    async fn history_of(&self, item_id: i64) -> Result<Vec<ChangeEvent>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM change_events WHERE item_id = ? ORDER BY recorded_at DESC, id DESC",
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.iter().map(event_from_row).collect()
    }
}

// ============================================================================
// ICursorRepository
// ============================================================================

#[async_trait::async_trait]
impl ICursorRepository for SqliteStateStore {
    async fn get(&self, drive_id: &DriveId) -> Result<Option<DriveCursor>, StoreError> {
        let row = sqlx::query("SELECT * FROM drive_cursors WHERE drive_id = ?")
            .bind(drive_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let cursor_str: Option<String> = get_column(&row, "cursor")?;
        let last_sync_str: Option<String> = get_column(&row, "last_sync_at")?;

        let cursor = match cursor_str {
            Some(ref s) if !s.is_empty() => Some(
                DeltaToken::new(s.clone())
                    .map_err(|e| StoreError::Decode(format!("invalid cursor: {e}")))?,
            ),
            _ => None,
        };

        Ok(Some(DriveCursor {
            drive_id: drive_id.clone(),
            cursor,
            last_sync_at: parse_optional_datetime(last_sync_str)?,
        }))
    }

    async fn set(&self, drive_id: &DriveId, cursor: &DeltaToken) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO drive_cursors (drive_id, cursor, last_sync_at)
            VALUES (?, ?, ?)
            ON CONFLICT(drive_id) DO UPDATE SET
                cursor = excluded.cursor,
                last_sync_at = excluded.last_sync_at
            "#,
        )
        .bind(drive_id.as_str())
        .bind(cursor.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }

    async fn clear(&self, drive_id: &DriveId) -> Result<(), StoreError> {
        sqlx::query("UPDATE drive_cursors SET cursor = NULL WHERE drive_id = ?")
            .bind(drive_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(())
    }
}

// ============================================================================
// ISubscriptionRepository
// ============================================================================

#[async_trait::async_trait]
impl ISubscriptionRepository for SqliteStateStore {
    async fn find_by_resource(&self, resource: &str) -> Result<Option<Subscription>, StoreError> {
        // Only the most recent record per resource counts as live.
        let row = sqlx::query(
            "SELECT * FROM subscriptions WHERE resource = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(resource)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        row.as_ref().map(subscription_from_row).transpose()
    }

    async fn find_by_provider_id(
        &self,
        provider_id: &str,
    ) -> Result<Option<Subscription>, StoreError> {
        let row = sqlx::query("SELECT * FROM subscriptions WHERE provider_id = ?")
            .bind(provider_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        row.as_ref().map(subscription_from_row).transpose()
    }

    async fn save(&self, subscription: &Subscription) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (provider_id, resource, client_state, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(provider_id) DO UPDATE SET
                resource = excluded.resource,
                client_state = excluded.client_state,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(&subscription.provider_id)
        .bind(&subscription.resource)
        .bind(&subscription.client_state)
        .bind(subscription.expires_at.to_rfc3339())
        .bind(subscription.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }

    async fn update_expiry(
        &self,
        provider_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE subscriptions SET expires_at = ? WHERE provider_id = ?")
            .bind(expires_at.to_rfc3339())
            .bind(provider_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(())
    }

    async fn delete(&self, provider_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM subscriptions WHERE provider_id = ?")
            .bind(provider_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(())
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM subscriptions WHERE expires_at < ? ORDER BY expires_at",
        )
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.iter().map(subscription_from_row).collect()
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE expires_at < ?")
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(result.rows_affected())
    }
}

// ============================================================================
// IChangeApplier - the atomic apply-one-item step
// ============================================================================

#[async_trait::async_trait]
impl IChangeApplier for SqliteStateStore {
    async fn apply_upsert(
        &self,
        write: &ItemWrite,
        event: Option<&EventDetails>,
    ) -> Result<Item, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let item = upsert_on(&mut tx, write).await?;
        if let Some(details) = event {
            append_on(&mut tx, item.id, details).await?;
        }

        tx.commit().await.map_err(map_sqlx)?;
        Ok(item)
    }

    async fn apply_delete(&self, item_id: i64, event: &EventDetails) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        mark_deleted_on(&mut tx, item_id).await?;
        append_on(&mut tx, item_id, event).await?;

        tx.commit().await.map_err(map_sqlx)
    }
}
