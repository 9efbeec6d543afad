//! Integration tests for delta (incremental sync) queries
//!
//! Verifies end-to-end behavior of the delta module against a
//! wiremock-based Graph API mock server:
//! - Full sync (no cursor)
//! - Incremental query (with cursor)
//! - Pagination across multiple pages
//! - Root entry filtering and parent collapsing
//! - Rate-limit retry honoring the provider hint

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use drivetrail_core::domain::newtypes::{DeltaToken, DriveId};
use drivetrail_core::ports::provider::IProviderGateway;

use crate::common;

const DRIVE: &str = "drive-test-001";

fn drive_id() -> DriveId {
    DriveId::new(DRIVE).unwrap()
}

#[tokio::test]
async fn test_full_sync_returns_all_items() {
    let (server, gateway) = common::setup_gateway().await;

    let items = serde_json::json!([
        {
            "id": "root-entry",
            "name": "root",
            "folder": {},
            "root": {}
        },
        {
            "id": "folder-001",
            "name": "Documents",
            "folder": { "childCount": 2 },
            "createdDateTime": "2026-01-10T08:00:00Z",
            "lastModifiedDateTime": "2026-01-15T10:00:00Z",
            "parentReference": { "id": "root-entry", "path": format!("/drives/{DRIVE}/root:") }
        },
        {
            "id": "file-001",
            "name": "document.txt",
            "file": {},
            "lastModifiedDateTime": "2026-01-15T10:00:00Z",
            "parentReference": { "id": "folder-001", "path": format!("/drives/{DRIVE}/root:/Documents") }
        }
    ]);

    common::mount_delta_single_page(&server, DRIVE, items, "initial-token-001").await;

    let batch = gateway
        .delta_complete(&drive_id(), None)
        .await
        .expect("full sync failed");

    // The root entry is filtered out.
    assert_eq!(batch.changes.len(), 2);
    assert_eq!(batch.cursor.as_str(), "initial-token-001");

    let folder = &batch.changes[0];
    assert_eq!(folder.external_id, "folder-001");
    assert!(folder.is_folder);
    assert!(folder.parent_external_id.is_none());

    let file = &batch.changes[1];
    assert_eq!(file.external_id, "file-001");
    assert!(!file.is_folder);
    assert_eq!(file.parent_external_id.as_deref(), Some("folder-001"));
}

#[tokio::test]
async fn test_incremental_with_cursor() {
    let server = MockServer::start().await;
    let gateway = drivetrail_graph::GraphGateway::with_base_url("test-bearer", server.uri());

    Mock::given(method("GET"))
        .and(path(format!("/drives/{DRIVE}/root/delta")))
        .and(query_param("token", "previous-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                {
                    "id": "file-002",
                    "name": "new-file.txt",
                    "file": {},
                    "lastModifiedDateTime": "2026-01-16T08:00:00Z",
                    "parentReference": { "id": "root-entry", "path": format!("/drives/{DRIVE}/root:") }
                }
            ],
            "@odata.deltaLink": format!(
                "{}/drives/{}/root/delta?token=incremental-token-002",
                server.uri(),
                DRIVE
            )
        })))
        .mount(&server)
        .await;

    let cursor = DeltaToken::new("previous-token").unwrap();
    let batch = gateway
        .delta_complete(&drive_id(), Some(&cursor))
        .await
        .expect("incremental sync failed");

    assert_eq!(batch.changes.len(), 1);
    assert_eq!(batch.changes[0].external_id, "file-002");
    assert_eq!(batch.cursor.as_str(), "incremental-token-002");
}

#[tokio::test]
async fn test_pagination_accumulates_in_order() {
    let server = MockServer::start().await;
    let gateway = drivetrail_graph::GraphGateway::with_base_url("test-bearer", server.uri());

    // Page 1 returns a nextLink.
    Mock::given(method("GET"))
        .and(path(format!("/drives/{DRIVE}/root/delta")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                { "id": "a", "name": "first.txt", "file": {},
                  "parentReference": { "id": "r", "path": format!("/drives/{DRIVE}/root:") } }
            ],
            "@odata.nextLink": format!("{}/delta-page-2", server.uri())
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    // Page 2 (absolute nextLink URL) returns the deltaLink.
    Mock::given(method("GET"))
        .and(path("/delta-page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                { "id": "b", "name": "second.txt", "file": {},
                  "parentReference": { "id": "r", "path": format!("/drives/{DRIVE}/root:") } }
            ],
            "@odata.deltaLink": format!(
                "{}/drives/{}/root/delta?token=paged-token",
                server.uri(),
                DRIVE
            )
        })))
        .mount(&server)
        .await;

    let batch = gateway.delta_complete(&drive_id(), None).await.unwrap();

    assert_eq!(batch.changes.len(), 2);
    assert_eq!(batch.changes[0].external_id, "a");
    assert_eq!(batch.changes[1].external_id, "b");
    assert_eq!(batch.cursor.as_str(), "paged-token");
}

#[tokio::test]
async fn test_empty_delta_page_still_advances() {
    let (server, gateway) = common::setup_gateway().await;
    common::mount_delta_single_page(&server, DRIVE, serde_json::json!([]), "empty-token").await;

    let batch = gateway.delta_complete(&drive_id(), None).await.unwrap();
    assert!(batch.changes.is_empty());
    assert_eq!(batch.cursor.as_str(), "empty-token");
}

#[tokio::test]
async fn test_tombstones_map_to_deleted_changes() {
    let (server, gateway) = common::setup_gateway().await;

    let items = serde_json::json!([
        { "id": "del-001", "name": "removed.txt", "deleted": { "state": "deleted" } },
        { "id": "del-002", "name": "also-removed.pdf", "deleted": {} }
    ]);
    common::mount_delta_single_page(&server, DRIVE, items, "delete-token").await;

    let batch = gateway.delta_complete(&drive_id(), None).await.unwrap();
    assert_eq!(batch.changes.len(), 2);
    assert!(batch.changes.iter().all(|c| c.is_deleted));
}

#[tokio::test]
async fn test_rate_limit_retried_with_hint() {
    let server = MockServer::start().await;
    let gateway = drivetrail_graph::GraphGateway::with_base_url("test-bearer", server.uri());

    // First attempt throttled with an immediate-retry hint, second succeeds.
    Mock::given(method("GET"))
        .and(path(format!("/drives/{DRIVE}/root/delta")))
        .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/drives/{DRIVE}/root/delta")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [],
            "@odata.deltaLink": format!(
                "{}/drives/{}/root/delta?token=after-throttle",
                server.uri(),
                DRIVE
            )
        })))
        .mount(&server)
        .await;

    let batch = gateway.delta_complete(&drive_id(), None).await.unwrap();
    assert_eq!(batch.cursor.as_str(), "after-throttle");
}

#[tokio::test]
async fn test_auth_failure_surfaces_without_retry() {
    let server = MockServer::start().await;
    let gateway = drivetrail_graph::GraphGateway::with_base_url("stale-bearer", server.uri());

    Mock::given(method("GET"))
        .and(path(format!("/drives/{DRIVE}/root/delta")))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = gateway.delta_complete(&drive_id(), None).await.unwrap_err();
    assert!(err.is_auth());
}
