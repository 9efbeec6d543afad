//! Subscription lifecycle management
//!
//! Keeps exactly one live webhook subscription per watched resource:
//! creates one when none exists, renews before expiry, recreates when the
//! provider has forgotten it, and sweeps records that died on both sides.
//! Also authenticates inbound notifications by comparing the echoed shared
//! secret against the stored one.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use drivetrail_core::config::SubscriptionsConfig;
use drivetrail_core::domain::Subscription;
use drivetrail_core::ports::provider::IProviderGateway;
use drivetrail_core::ports::store::ISubscriptionRepository;

use crate::engine::SyncError;

/// Manages webhook subscriptions against the provider and the local store
pub struct SubscriptionManager {
    gateway: Arc<dyn IProviderGateway>,
    repo: Arc<dyn ISubscriptionRepository>,
    notify_url: String,
    /// Target lifetime at creation/renewal; the provider caps this
    lifetime: Duration,
    /// Renew when remaining life falls below this
    renew_threshold: Duration,
    /// Generated secrets are never shorter than this
    secret_floor: usize,
}

impl SubscriptionManager {
    /// Creates a manager from the subscriptions config section
    pub fn new(
        gateway: Arc<dyn IProviderGateway>,
        repo: Arc<dyn ISubscriptionRepository>,
        config: &SubscriptionsConfig,
    ) -> Self {
        Self {
            gateway,
            repo,
            notify_url: config.notify_url.clone(),
            lifetime: Duration::hours(config.lifetime_hours as i64),
            renew_threshold: Duration::hours(config.renew_threshold_hours as i64),
            secret_floor: config.secret_floor,
        }
    }

    /// Ensures a live subscription exists for `resource`
    ///
    /// Decision ladder:
    /// - no local record: create
    /// - local record, provider gone (404): drop local, create fresh
    /// - provider alive with comfortable expiry: keep unchanged
    /// - provider alive, expiring soon: renew to now + lifetime
    pub async fn ensure_live(&self, resource: &str) -> Result<Subscription, SyncError> {
        let now = Utc::now();

        if let Some(local) = self.repo.find_by_resource(resource).await? {
            match self.gateway.get_subscription(&local.provider_id).await? {
                Some(remote) => {
                    // The provider-side expiry is authoritative; the local
                    // record may have drifted.
                    let current = Subscription {
                        expires_at: remote.expires_at,
                        ..local
                    };

                    if !current.needs_renewal(now, self.renew_threshold) {
                        debug!(
                            subscription = %current.provider_id,
                            expires_at = %current.expires_at,
                            "Subscription still fresh"
                        );
                        return Ok(current);
                    }

                    let new_expiry = now + self.lifetime;
                    self.gateway
                        .renew_subscription(&current.provider_id, new_expiry)
                        .await?;
                    self.repo
                        .update_expiry(&current.provider_id, new_expiry)
                        .await?;
                    info!(
                        subscription = %current.provider_id,
                        expires_at = %new_expiry,
                        "Subscription renewed"
                    );
                    return Ok(Subscription {
                        expires_at: new_expiry,
                        ..current
                    });
                }
                None => {
                    // Provider forgot the registration; the local record is
                    // dead weight and the secret must not be reused.
                    warn!(
                        subscription = %local.provider_id,
                        "Provider lost the subscription, recreating"
                    );
                    self.repo.delete(&local.provider_id).await?;
                }
            }
        }

        let client_state = self.generate_client_state();
        let expires_at = now + self.lifetime;

        let created = self
            .gateway
            .create_subscription(resource, &self.notify_url, &client_state, expires_at)
            .await?;

        let subscription = Subscription {
            provider_id: created.id,
            resource: resource.to_string(),
            client_state,
            expires_at: created.expires_at,
            created_at: now,
        };
        self.repo.save(&subscription).await?;

        info!(
            subscription = %subscription.provider_id,
            resource,
            expires_at = %subscription.expires_at,
            "Subscription created"
        );

        Ok(subscription)
    }

    /// Authenticates one inbound notification entry
    ///
    /// Returns true only when the referenced subscription is known and the
    /// presented shared secret matches byte-for-byte. Everything else is
    /// dropped by the caller without emitting a job.
    pub async fn authenticate(
        &self,
        subscription_id: &str,
        presented_state: &str,
    ) -> Result<bool, SyncError> {
        match self.repo.find_by_provider_id(subscription_id).await? {
            // Expired records linger for audit only; they never validate.
            Some(sub) if sub.is_expired(Utc::now()) => {
                warn!(
                    subscription = subscription_id,
                    "Notification for expired subscription rejected"
                );
                Ok(false)
            }
            Some(sub) if sub.matches_client_state(presented_state) => Ok(true),
            Some(_) => {
                warn!(
                    subscription = subscription_id,
                    "Notification with mismatched client state rejected"
                );
                Ok(false)
            }
            None => {
                warn!(
                    subscription = subscription_id,
                    "Notification for unknown subscription rejected"
                );
                Ok(false)
            }
        }
    }

    /// Removes local records that expired and no longer exist provider-side
    ///
    /// A record the provider still knows is left for `ensure_live` to
    /// renew or recreate. Returns the number of records removed.
    pub async fn sweep_expired(&self) -> Result<u64, SyncError> {
        let now = Utc::now();
        let mut removed = 0;

        for stale in self.repo.list_expired(now).await? {
            if self
                .gateway
                .get_subscription(&stale.provider_id)
                .await?
                .is_none()
            {
                self.repo.delete(&stale.provider_id).await?;
                removed += 1;
                info!(subscription = %stale.provider_id, "Swept expired subscription");
            }
        }

        Ok(removed)
    }

    /// Generates a fresh shared secret
    ///
    /// Concatenated v4 UUIDs, 32 hex chars each, repeated until the
    /// configured floor is met. At least 64 chars regardless of config.
    fn generate_client_state(&self) -> String {
        let target = self.secret_floor.max(64);
        let mut secret = String::with_capacity(target + 32);
        while secret.len() < target {
            secret.push_str(&Uuid::new_v4().simple().to_string());
        }
        secret
    }
}
