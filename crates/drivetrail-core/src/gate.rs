//! Credential gate
//!
//! A process-wide flag gating all work that would touch the provider or
//! mutate the store. The flag starts disabled (unless configured
//! otherwise), is enabled by a successful bootstrap, and is disabled by
//! any worker that observes an authentication failure from the gateway.
//! Recovery requires an operator to re-run bootstrap.
//!
//! The flag is deliberately process-local and not durable: a restart
//! begins disabled, which forces bootstrap to re-validate the bearer
//! credential before work resumes.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::ports::provider::{IProviderGateway, IdentityProbe, Principal, ProbeFailure};

/// Process-wide enable/disable switch shared by all workers
///
/// Reads are lock-free; writes are atomic and immediately visible to
/// every worker.
#[derive(Debug)]
pub struct CredentialGate {
    enabled: AtomicBool,
}

impl CredentialGate {
    /// Creates a gate with the given initial state
    #[must_use]
    pub fn new(initially_enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(initially_enabled),
        }
    }

    /// Creates a gate in the disabled state
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(false)
    }

    /// Enables downstream processing
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    /// Disables downstream processing
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    /// Returns whether workers may proceed
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Probes the provider for credential validity
    ///
    /// Delegates to the gateway's identity probe. Does not toggle the
    /// gate; callers decide whether a failure disables it.
    pub async fn validate(
        &self,
        gateway: &dyn IProviderGateway,
    ) -> Result<Principal, ProbeFailure> {
        match gateway.probe_identity().await {
            IdentityProbe::Valid(principal) => Ok(principal),
            IdentityProbe::Invalid(reason) => Err(reason),
        }
    }
}

impl Default for CredentialGate {
    fn default() -> Self {
        Self::disabled()
    }
}
