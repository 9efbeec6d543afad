//! Gateway adapter implementing the provider port
//!
//! [`GraphGateway`] composes the typed client with the backoff policy so
//! that everything above the port sees whole delta batches and an error
//! taxonomy with retries already exhausted.

use chrono::{DateTime, Utc};

use drivetrail_core::domain::newtypes::{DeltaToken, DriveId};
use drivetrail_core::ports::provider::{
    DeltaBatch, GatewayError, IProviderGateway, IdentityProbe, ProviderSubscription,
};

use crate::client::GraphClient;
use crate::retry::with_backoff;
use crate::{delta, subscriptions};

/// Microsoft Graph implementation of `IProviderGateway`
pub struct GraphGateway {
    client: GraphClient,
}

impl GraphGateway {
    /// Creates a gateway over the production Graph endpoint
    pub fn new(bearer: impl Into<String>) -> Self {
        Self {
            client: GraphClient::new(bearer),
        }
    }

    /// Creates a gateway over a custom base URL (tests)
    pub fn with_base_url(bearer: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: GraphClient::with_base_url(bearer, base_url),
        }
    }

    /// Borrow of the underlying client
    pub fn client(&self) -> &GraphClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl IProviderGateway for GraphGateway {
    async fn probe_identity(&self) -> IdentityProbe {
        // The probe is its own retry policy: a transport failure is an
        // answer, not an error, and the caller decides what to do with it.
        self.client.probe_identity().await
    }

    async fn resolve_default_drive(&self) -> Result<DriveId, GatewayError> {
        with_backoff("resolve_default_drive", || {
            self.client.resolve_default_drive()
        })
        .await
    }

    async fn delta_complete(
        &self,
        drive_id: &DriveId,
        cursor: Option<&DeltaToken>,
    ) -> Result<DeltaBatch, GatewayError> {
        with_backoff("delta_complete", || {
            delta::delta_complete(&self.client, drive_id, cursor)
        })
        .await
    }

    async fn create_subscription(
        &self,
        resource: &str,
        notification_url: &str,
        client_state: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<ProviderSubscription, GatewayError> {
        with_backoff("create_subscription", || {
            subscriptions::create(
                &self.client,
                resource,
                notification_url,
                client_state,
                expires_at,
            )
        })
        .await
    }

    async fn get_subscription(
        &self,
        provider_id: &str,
    ) -> Result<Option<ProviderSubscription>, GatewayError> {
        with_backoff("get_subscription", || {
            subscriptions::get(&self.client, provider_id)
        })
        .await
    }

    async fn renew_subscription(
        &self,
        provider_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        with_backoff("renew_subscription", || {
            subscriptions::renew(&self.client, provider_id, expires_at)
        })
        .await
    }

    async fn delete_subscription(&self, provider_id: &str) -> Result<(), GatewayError> {
        with_backoff("delete_subscription", || {
            subscriptions::delete(&self.client, provider_id)
        })
        .await
    }
}
