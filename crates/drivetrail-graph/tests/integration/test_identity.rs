//! Integration tests for the identity probe and drive resolution
//!
//! The probe is a total function: every HTTP outcome must map into the
//! result union, never into a panic or an error.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use drivetrail_core::ports::provider::{IProviderGateway, IdentityProbe, ProbeFailure};
use drivetrail_graph::GraphGateway;

use crate::common;

#[tokio::test]
async fn test_probe_valid_credential() {
    let (server, gateway) = common::setup_gateway().await;
    common::mount_me_ok(&server).await;

    match gateway.probe_identity().await {
        IdentityProbe::Valid(principal) => {
            assert_eq!(principal.user_id, "user-test-001");
            assert_eq!(principal.principal_name, "test@example.com");
        }
        other => panic!("expected valid probe, got {other:?}"),
    }
}

#[tokio::test]
async fn test_probe_expired_credential() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    match gateway.probe_identity().await {
        IdentityProbe::Invalid(reason) => assert_eq!(reason, ProbeFailure::Expired),
        other => panic!("expected invalid probe, got {other:?}"),
    }
}

#[tokio::test]
async fn test_probe_forbidden_credential() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    match gateway.probe_identity().await {
        IdentityProbe::Invalid(reason) => assert_eq!(reason, ProbeFailure::Forbidden),
        other => panic!("expected invalid probe, got {other:?}"),
    }
}

#[tokio::test]
async fn test_probe_unexpected_status_maps_to_unknown() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(418))
        .mount(&server)
        .await;

    match gateway.probe_identity().await {
        IdentityProbe::Invalid(reason) => assert_eq!(reason, ProbeFailure::Unknown),
        other => panic!("expected invalid probe, got {other:?}"),
    }
}

#[tokio::test]
async fn test_probe_transport_failure() {
    // A gateway pointed at a closed port: nothing reaches the provider.
    let gateway = GraphGateway::with_base_url("bearer", "http://127.0.0.1:1");

    match gateway.probe_identity().await {
        IdentityProbe::Invalid(reason) => assert_eq!(reason, ProbeFailure::Transport),
        other => panic!("expected transport failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_resolve_default_drive() {
    let (server, gateway) = common::setup_gateway().await;
    common::mount_default_drive(&server, "drive-test-001").await;

    let drive_id = gateway.resolve_default_drive().await.unwrap();
    assert_eq!(drive_id.as_str(), "drive-test-001");
}

#[tokio::test]
async fn test_resolve_default_drive_auth_failure() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("GET"))
        .and(path("/me/drive"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = gateway.resolve_default_drive().await.unwrap_err();
    assert!(err.is_auth());
}
