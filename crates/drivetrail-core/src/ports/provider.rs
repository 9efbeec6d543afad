//! Provider gateway port (driven/secondary port)
//!
//! Interface to the cloud provider's REST surface. The primary
//! implementation targets Microsoft Graph, but the trait only assumes the
//! general shape: a "describe caller" probe, an opaque-cursor delta feed,
//! and webhook subscription CRUD.
//!
//! ## Design Notes
//!
//! - Errors are an explicit variant union ([`GatewayError`]), not a blanket
//!   `anyhow::Error`: workers route on the variant (auth failures disable
//!   the gate, rate limits and transients are retried, the rest is fatal).
//! - [`RemoteChange`] is a port-level DTO decoded narrowly from the
//!   provider payload; fields the system does not consume are dropped at
//!   the adapter.
//! - `probe_identity` is total: transport failures map into the result,
//!   never into an error, so the credential gate can treat every outcome
//!   uniformly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::domain::newtypes::{DeltaToken, DriveId};

/// The authenticated caller as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Provider-scoped user id
    pub user_id: String,
    /// Human-readable principal name, typically the sign-in address
    pub principal_name: String,
}

/// Why an identity probe did not yield a principal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFailure {
    /// Credential rejected as expired (HTTP 401)
    Expired,
    /// Credential valid but not allowed (HTTP 403)
    Forbidden,
    /// Network-level failure, nothing reached the provider
    Transport,
    /// Any other unexpected outcome
    Unknown,
}

impl std::fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProbeFailure::Expired => "expired",
            ProbeFailure::Forbidden => "forbidden",
            ProbeFailure::Transport => "transport",
            ProbeFailure::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Outcome of a credential validity probe, always a value, never an error
#[derive(Debug, Clone)]
pub enum IdentityProbe {
    /// The credential works; here is who it belongs to
    Valid(Principal),
    /// The credential cannot be used right now
    Invalid(ProbeFailure),
}

/// One change entry from the delta feed, decoded narrowly
///
/// Only the fields the reconciliation engine consumes are kept. A missing
/// `parent_external_id` means the item sits directly under the drive root.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteChange {
    /// Provider-issued item id
    pub external_id: String,
    /// Item name at the time of the change
    pub name: String,
    /// Provider id of the parent folder, None for root-level items
    pub parent_external_id: Option<String>,
    /// Folder facet present
    pub is_folder: bool,
    /// Tombstone facet present
    pub is_deleted: bool,
    /// Provider-reported creation time
    pub created: Option<DateTime<Utc>>,
    /// Provider-reported modification time
    pub modified: Option<DateTime<Utc>>,
}

/// A subscription as the provider reports it
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSubscription {
    /// Provider-assigned subscription id
    pub id: String,
    /// The watched resource
    pub resource: String,
    /// Provider-side expiry
    pub expires_at: DateTime<Utc>,
}

/// A fully drained delta feed: every page accumulated plus the terminal token
#[derive(Debug, Clone)]
pub struct DeltaBatch {
    /// All changed items across all pages, in provider order
    pub changes: Vec<RemoteChange>,
    /// Cursor for the next incremental pass
    pub cursor: DeltaToken,
}

/// Error taxonomy surfaced by every gateway operation
#[derive(Debug, Error)]
pub enum GatewayError {
    /// 401 or 403: the bearer credential is no longer usable. Workers that
    /// observe this must disable the credential gate before returning.
    #[error("provider rejected the credential: {0}")]
    AuthInvalid(String),

    /// 429: back off, honoring the provider's Retry-After hint when given
    #[error("provider rate limit hit")]
    RateLimited {
        /// Provider-supplied wait hint, if any
        retry_after: Option<Duration>,
    },

    /// 5xx, timeouts, connection failures: safe to retry with backoff
    #[error("transient provider failure: {0}")]
    Transient(String),

    /// Any other 4xx or an undecodable payload: do not retry
    #[error("provider request failed: {0}")]
    Fatal(String),
}

impl GatewayError {
    /// Returns true for errors a retry loop may absorb
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::RateLimited { .. } | GatewayError::Transient(_)
        )
    }

    /// Returns true when the credential itself is the problem
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, GatewayError::AuthInvalid(_))
    }
}

/// Port trait for the provider's REST surface
///
/// Implementations hide pagination and transport plumbing; callers see
/// whole delta batches and the four-variant error taxonomy. Retry with
/// backoff for `RateLimited` and `Transient` happens inside the adapter,
/// so an error surfacing here means retries are already exhausted.
#[async_trait::async_trait]
pub trait IProviderGateway: Send + Sync {
    /// Minimal authenticated read ("describe caller") probing credential
    /// validity. Never fails: every outcome maps into [`IdentityProbe`].
    async fn probe_identity(&self) -> IdentityProbe;

    /// Resolves the id of the caller's default drive
    async fn resolve_default_drive(&self) -> Result<DriveId, GatewayError>;

    /// Drains the delta feed from `cursor`, following continuation pages
    ///
    /// With `cursor = None` the provider performs a full enumeration.
    /// The returned batch carries the terminal token for the next pass.
    async fn delta_complete(
        &self,
        drive_id: &DriveId,
        cursor: Option<&DeltaToken>,
    ) -> Result<DeltaBatch, GatewayError>;

    /// Registers a webhook subscription for `resource`
    async fn create_subscription(
        &self,
        resource: &str,
        notification_url: &str,
        client_state: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<ProviderSubscription, GatewayError>;

    /// Fetches a subscription by provider id; 404 maps to `Ok(None)`
    async fn get_subscription(
        &self,
        provider_id: &str,
    ) -> Result<Option<ProviderSubscription>, GatewayError>;

    /// Extends a subscription's expiry
    async fn renew_subscription(
        &self,
        provider_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), GatewayError>;

    /// Deletes a subscription; a 404 counts as success
    async fn delete_subscription(&self, provider_id: &str) -> Result<(), GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(GatewayError::RateLimited { retry_after: None }.is_retryable());
        assert!(GatewayError::Transient("502".into()).is_retryable());
        assert!(!GatewayError::AuthInvalid("401".into()).is_retryable());
        assert!(!GatewayError::Fatal("400".into()).is_retryable());
    }

    #[test]
    fn test_auth_classification() {
        assert!(GatewayError::AuthInvalid("403".into()).is_auth());
        assert!(!GatewayError::Transient("io".into()).is_auth());
    }

    #[test]
    fn test_probe_failure_display() {
        assert_eq!(ProbeFailure::Expired.to_string(), "expired");
        assert_eq!(ProbeFailure::Transport.to_string(), "transport");
    }
}
