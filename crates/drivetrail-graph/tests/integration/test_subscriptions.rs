//! Integration tests for subscription CRUD
//!
//! Covers the provider-side half of the subscription lifecycle: creation,
//! lookup (including the 404-means-gone mapping), renewal, and the
//! delete-tolerates-404 contract.

use chrono::{Duration, Utc};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use drivetrail_core::ports::provider::IProviderGateway;

use crate::common;

#[tokio::test]
async fn test_create_subscription() {
    let (server, gateway) = common::setup_gateway().await;
    let expires_at = Utc::now() + Duration::hours(70);

    Mock::given(method("POST"))
        .and(path("/subscriptions"))
        .and(body_partial_json(serde_json::json!({
            "changeType": "updated",
            "notificationUrl": "https://hooks.example.com/notify",
            "resource": "/me/drive/root",
            "clientState": "a-very-long-shared-secret-string"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": "sub-created-001",
            "resource": "/me/drive/root",
            "expirationDateTime": expires_at.to_rfc3339(),
            "clientState": "a-very-long-shared-secret-string"
        })))
        .mount(&server)
        .await;

    let sub = gateway
        .create_subscription(
            "/me/drive/root",
            "https://hooks.example.com/notify",
            "a-very-long-shared-secret-string",
            expires_at,
        )
        .await
        .expect("create failed");

    assert_eq!(sub.id, "sub-created-001");
    assert_eq!(sub.resource, "/me/drive/root");
}

#[tokio::test]
async fn test_get_subscription_found() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("GET"))
        .and(path("/subscriptions/sub-001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "sub-001",
            "resource": "/me/drive/root",
            "expirationDateTime": "2026-08-04T12:00:00Z"
        })))
        .mount(&server)
        .await;

    let sub = gateway.get_subscription("sub-001").await.unwrap();
    assert_eq!(sub.unwrap().id, "sub-001");
}

#[tokio::test]
async fn test_get_subscription_gone_maps_to_none() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("GET"))
        .and(path("/subscriptions/sub-gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let sub = gateway.get_subscription("sub-gone").await.unwrap();
    assert!(sub.is_none());
}

#[tokio::test]
async fn test_renew_subscription() {
    let (server, gateway) = common::setup_gateway().await;
    let new_expiry = Utc::now() + Duration::hours(70);

    Mock::given(method("PATCH"))
        .and(path("/subscriptions/sub-001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "sub-001",
            "expirationDateTime": new_expiry.to_rfc3339()
        })))
        .expect(1)
        .mount(&server)
        .await;

    gateway
        .renew_subscription("sub-001", new_expiry)
        .await
        .expect("renew failed");
}

#[tokio::test]
async fn test_delete_subscription() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("DELETE"))
        .and(path("/subscriptions/sub-001"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    gateway.delete_subscription("sub-001").await.unwrap();
}

#[tokio::test]
async fn test_delete_subscription_tolerates_404() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("DELETE"))
        .and(path("/subscriptions/sub-gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    gateway.delete_subscription("sub-gone").await.unwrap();
}
