//! Shared test helpers for Graph gateway integration tests
//!
//! Provides wiremock-based mock server setup for the Graph endpoints the
//! gateway consumes. Each helper mounts the necessary mock endpoints and
//! returns a gateway pointing at the mock server.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use drivetrail_graph::GraphGateway;

/// Starts a mock server and returns a gateway pointed at it.
pub async fn setup_gateway() -> (MockServer, GraphGateway) {
    let server = MockServer::start().await;
    let gateway = GraphGateway::with_base_url("test-bearer", server.uri());
    (server, gateway)
}

/// Mounts GET /me returning a valid identity.
pub async fn mount_me_ok(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "user-test-001",
            "userPrincipalName": "test@example.com",
            "mail": "test@example.com",
            "displayName": "Test User"
        })))
        .mount(server)
        .await;
}

/// Mounts GET /me/drive returning the default drive.
pub async fn mount_default_drive(server: &MockServer, drive_id: &str) {
    Mock::given(method("GET"))
        .and(path("/me/drive"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": drive_id,
            "driveType": "personal"
        })))
        .mount(server)
        .await;
}

/// Mounts a delta endpoint returning a single page with the given items.
pub async fn mount_delta_single_page(
    server: &MockServer,
    drive_id: &str,
    items: serde_json::Value,
    delta_token: &str,
) {
    let delta_path = format!("/drives/{drive_id}/root/delta");
    Mock::given(method("GET"))
        .and(path(&delta_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": items,
            "@odata.deltaLink": format!(
                "{}/drives/{}/root/delta?token={}",
                server.uri(),
                drive_id,
                delta_token
            )
        })))
        .mount(server)
        .await;
}
