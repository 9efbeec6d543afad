//! Microsoft Graph webhook subscription CRUD
//!
//! Thin typed wrappers over the `/subscriptions` resource. Creation
//! triggers the provider's validation round-trip against the notification
//! URL, so the daemon's `/notify` endpoint must be reachable before
//! `create` is called.

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use drivetrail_core::ports::provider::{GatewayError, ProviderSubscription};

use crate::client::GraphClient;
use crate::error::classify_response;

/// Change types the subscription asks for. Graph only supports `updated`
/// on drive resources; creates, renames, moves, and deletes all arrive as
/// updates and the delta pass tells them apart.
const CHANGE_TYPE: &str = "updated";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSubscriptionRequest<'a> {
    change_type: &'a str,
    notification_url: &'a str,
    resource: &'a str,
    expiration_date_time: String,
    client_state: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RenewSubscriptionRequest {
    expiration_date_time: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionResponse {
    id: String,
    resource: Option<String>,
    expiration_date_time: DateTime<Utc>,
}

impl SubscriptionResponse {
    fn into_provider_subscription(self, fallback_resource: &str) -> ProviderSubscription {
        ProviderSubscription {
            id: self.id,
            resource: self.resource.unwrap_or_else(|| fallback_resource.to_string()),
            expires_at: self.expiration_date_time,
        }
    }
}

fn format_expiry(expires_at: DateTime<Utc>) -> String {
    expires_at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Registers a new subscription for `resource`
pub async fn create(
    client: &GraphClient,
    resource: &str,
    notification_url: &str,
    client_state: &str,
    expires_at: DateTime<Utc>,
) -> Result<ProviderSubscription, GatewayError> {
    debug!(resource, "Creating subscription");

    let body = CreateSubscriptionRequest {
        change_type: CHANGE_TYPE,
        notification_url,
        resource,
        expiration_date_time: format_expiry(expires_at),
        client_state,
    };

    let response: SubscriptionResponse = client
        .send_json(
            client.request(Method::POST, "/subscriptions").json(&body),
            "create subscription",
        )
        .await?;

    Ok(response.into_provider_subscription(resource))
}

/// Fetches a subscription by id; a 404 maps to `Ok(None)`
pub async fn get(
    client: &GraphClient,
    provider_id: &str,
) -> Result<Option<ProviderSubscription>, GatewayError> {
    let path = format!("/subscriptions/{provider_id}");

    let response = client
        .request(Method::GET, &path)
        .send()
        .await
        .map_err(|e| crate::error::classify_transport(e, "get subscription"))?;

    match response.status() {
        StatusCode::NOT_FOUND => Ok(None),
        status if status.is_success() => {
            let body: SubscriptionResponse = response.json().await.map_err(|e| {
                GatewayError::Fatal(format!("get subscription: undecodable payload: {e}"))
            })?;
            Ok(Some(body.into_provider_subscription("")))
        }
        _ => Err(classify_response(response, "get subscription").await),
    }
}

/// Extends a subscription's expiry
pub async fn renew(
    client: &GraphClient,
    provider_id: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), GatewayError> {
    debug!(provider_id, "Renewing subscription");

    let path = format!("/subscriptions/{provider_id}");
    let body = RenewSubscriptionRequest {
        expiration_date_time: format_expiry(expires_at),
    };

    client
        .send(
            client.request(Method::PATCH, &path).json(&body),
            "renew subscription",
        )
        .await?;

    Ok(())
}

/// Deletes a subscription; a 404 counts as success
pub async fn delete(client: &GraphClient, provider_id: &str) -> Result<(), GatewayError> {
    debug!(provider_id, "Deleting subscription");

    let path = format!("/subscriptions/{provider_id}");

    let response = client
        .request(Method::DELETE, &path)
        .send()
        .await
        .map_err(|e| crate::error::classify_transport(e, "delete subscription"))?;

    match response.status() {
        StatusCode::NOT_FOUND => Ok(()),
        status if status.is_success() => Ok(()),
        _ => Err(classify_response(response, "delete subscription").await),
    }
}
