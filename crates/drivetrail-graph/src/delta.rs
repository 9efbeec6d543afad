//! Microsoft Graph delta queries for incremental reconciliation
//!
//! Implements the delta query pattern for a drive: an opaque token marks
//! how far the feed has been consumed, and each query returns only items
//! changed since that token, paginated via `@odata.nextLink` with the
//! terminal page carrying `@odata.deltaLink`.
//!
//! ## Delta Query Flow
//!
//! 1. **Full sync**: call [`delta_complete`] with `cursor = None`
//! 2. **Follow pages**: the function drains all `@odata.nextLink` pages
//! 3. **Terminal token**: the returned batch carries the token extracted
//!    from the final `@odata.deltaLink`
//! 4. **Incremental sync**: pass the saved token on the next call

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use tracing::debug;

use drivetrail_core::domain::newtypes::{DeltaToken, DriveId};
use drivetrail_core::ports::provider::{DeltaBatch, GatewayError, RemoteChange};

use crate::client::GraphClient;

// ============================================================================
// Graph API response types (JSON deserialization)
// ============================================================================

/// Raw response from the Graph delta API
///
/// Returned by `GET /drives/{drive-id}/root/delta`.
/// See: <https://learn.microsoft.com/en-us/graph/api/driveitem-delta>
#[derive(Debug, Deserialize)]
struct GraphDeltaResponse {
    /// Array of changed drive items
    #[serde(default)]
    value: Vec<GraphDriveItem>,

    /// URL for the next page of results (present when more pages exist)
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,

    /// URL containing the delta token for the next sync cycle
    /// (present only on the last page of results)
    #[serde(rename = "@odata.deltaLink")]
    delta_link: Option<String>,
}

/// A drive item from the delta response, decoded narrowly
///
/// Only the fields the reconciliation engine consumes are declared; the
/// rest of the payload is dropped on the floor.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphDriveItem {
    /// Unique identifier of the item within the drive
    id: String,

    /// Name of the item (filename or folder name)
    #[serde(default)]
    name: String,

    /// Creation time in ISO 8601 format
    created_date_time: Option<DateTime<Utc>>,

    /// Last modified time in ISO 8601 format
    last_modified_date_time: Option<DateTime<Utc>>,

    /// Reference to the parent item
    parent_reference: Option<GraphParentReference>,

    /// Folder facet (present if the item is a folder)
    folder: Option<serde_json::Value>,

    /// Deleted facet (present if the item has been tombstoned)
    deleted: Option<serde_json::Value>,

    /// Root facet (present only on the drive root itself)
    root: Option<serde_json::Value>,
}

/// Parent reference information for a drive item
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphParentReference {
    /// Unique identifier of the parent item
    id: Option<String>,

    /// Path of the parent in the drive, `.../root:` for the drive root
    path: Option<String>,
}

impl GraphDriveItem {
    /// True for the drive root entry, which the mirror does not track
    fn is_root_entry(&self) -> bool {
        self.root.is_some()
    }

    /// Resolves the parent's external id, mapping the drive root to None
    ///
    /// Top-level items report the root folder as their parent; the mirror
    /// represents them with a null parent instead, so the root marker in
    /// the parent path collapses the reference.
    fn parent_external_id(&self) -> Option<String> {
        let parent = self.parent_reference.as_ref()?;
        match parent.path.as_deref() {
            Some(path) if path.ends_with("root:") => None,
            _ => parent.id.clone(),
        }
    }

    fn into_remote_change(self) -> RemoteChange {
        let parent_external_id = self.parent_external_id();
        RemoteChange {
            external_id: self.id,
            name: self.name,
            parent_external_id,
            is_folder: self.folder.is_some(),
            is_deleted: self.deleted.is_some(),
            created: self.created_date_time,
            modified: self.last_modified_date_time,
        }
    }
}

/// Extracts the token parameter from a delta link URL
pub(crate) fn extract_delta_token(delta_link: &str) -> Option<String> {
    url::Url::parse(delta_link).ok().and_then(|u| {
        u.query_pairs()
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned())
    })
}

// ============================================================================
// Delta query
// ============================================================================

/// Drains the complete delta feed for a drive, following pagination
///
/// With `cursor = None` the provider enumerates the whole drive (full
/// sync); otherwise only changes since the cursor come back. The root
/// entry is filtered out; everything else is accumulated in provider
/// order.
///
/// # Errors
///
/// Surfaces the gateway taxonomy. A page carrying both or neither of
/// `nextLink`/`deltaLink`, or a terminal link without a token, is a
/// contract violation and maps to [`GatewayError::Fatal`].
pub async fn delta_complete(
    client: &GraphClient,
    drive_id: &DriveId,
    cursor: Option<&DeltaToken>,
) -> Result<DeltaBatch, GatewayError> {
    let base_path = format!("/drives/{}/root/delta", drive_id.as_str());
    let path = match cursor {
        Some(token) => format!("{}?token={}", base_path, token.as_str()),
        None => base_path,
    };

    debug!(drive = %drive_id, has_cursor = cursor.is_some(), "Starting delta query");

    let mut changes: Vec<RemoteChange> = Vec::new();
    let mut page_count: u32 = 0;

    let mut page: GraphDeltaResponse = client
        .send_json(client.request(Method::GET, &path), "delta")
        .await?;

    loop {
        page_count += 1;
        debug!(
            page = page_count,
            items = page.value.len(),
            has_next = page.next_link.is_some(),
            "Received delta page"
        );

        changes.extend(
            page.value
                .into_iter()
                .filter(|item| !item.is_root_entry())
                .map(GraphDriveItem::into_remote_change),
        );

        match (page.next_link, page.delta_link) {
            (Some(_), Some(_)) => {
                return Err(GatewayError::Fatal(
                    "delta: page carried both nextLink and deltaLink".into(),
                ));
            }
            (Some(next_link), None) => {
                page = client
                    .send_json(client.request_url(Method::GET, &next_link), "delta page")
                    .await?;
            }
            (None, Some(delta_link)) => {
                let token = extract_delta_token(&delta_link).ok_or_else(|| {
                    GatewayError::Fatal("delta: terminal link carried no token".into())
                })?;
                let cursor = DeltaToken::new(token)
                    .map_err(|e| GatewayError::Fatal(format!("delta: {e}")))?;

                debug!(
                    drive = %drive_id,
                    total_items = changes.len(),
                    total_pages = page_count,
                    "Delta query complete"
                );

                return Ok(DeltaBatch { changes, cursor });
            }
            (None, None) => {
                return Err(GatewayError::Fatal(
                    "delta: page carried neither nextLink nor deltaLink".into(),
                ));
            }
        }
    }
}
