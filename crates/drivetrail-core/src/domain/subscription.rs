//! Push subscription records
//!
//! A [`Subscription`] mirrors one live webhook registration at the
//! provider. The shared secret (`client_state`) is generated locally at
//! creation time and echoed back by the provider on every notification;
//! comparing it verbatim is how inbound pushes are authenticated.
//!
//! ## Lifecycle
//!
//! ```text
//!   None ──ensure_live──► Pending-create ──created──► Live
//!                                                      │
//!                          ┌──── renewed ◄── Renewing ◄┘ (expiry < threshold)
//!                          ▼
//!                         Live ──expiry passes──► Expiring ──sweep──► Dead
//! ```
//!
//! Only the most recent record per resource is considered live; expired
//! rows may linger for audit until swept.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One webhook subscription as persisted locally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Provider-assigned subscription id, unique
    pub provider_id: String,
    /// The watched resource, e.g. `/me/drive/root`
    pub resource: String,
    /// Shared secret echoed back on every notification
    pub client_state: String,
    /// When the provider will stop delivering notifications
    pub expires_at: DateTime<Utc>,
    /// When the record was created locally
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// Returns true once the provider-side registration has lapsed
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Returns true when remaining life is below the renewal threshold
    #[must_use]
    pub fn needs_renewal(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.expires_at - now < threshold
    }

    /// Verbatim comparison of a presented shared secret
    ///
    /// Byte-for-byte equality; anything else is a forgery or a stale
    /// subscription and the notification must be dropped.
    #[must_use]
    pub fn matches_client_state(&self, presented: &str) -> bool {
        self.client_state.as_bytes() == presented.as_bytes()
    }
}
