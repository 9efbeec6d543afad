//! Bootstrap procedure
//!
//! The operator-triggered sequence that brings the pipeline up:
//! validate the credential, resolve the default drive, ensure a live
//! subscription, run a full sync, and only then open the gate. Until a
//! bootstrap succeeds every queued job is a no-op.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use drivetrail_core::gate::CredentialGate;
use drivetrail_core::ports::provider::{GatewayError, IProviderGateway, ProbeFailure};
use drivetrail_sync::{DriveSlot, ReconciliationEngine, SubscriptionManager, SyncError};

/// The resource whose changes are mirrored: the default drive's root.
pub const WATCHED_RESOURCE: &str = "/me/drive/root";

/// Why a bootstrap attempt failed
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The bearer credential did not validate; the gate stays closed
    #[error("credential validation failed: {0}")]
    Unauthorized(ProbeFailure),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// What a successful bootstrap accomplished
#[derive(Debug, Serialize)]
pub struct BootstrapReport {
    pub principal: String,
    pub drive_id: String,
    pub subscription_id: String,
    pub items_processed: usize,
}

/// Orchestrates gate, subscription, and initial sync
pub struct Bootstrapper {
    gateway: Arc<dyn IProviderGateway>,
    gate: Arc<CredentialGate>,
    manager: Arc<SubscriptionManager>,
    engine: Arc<ReconciliationEngine>,
    drive: Arc<DriveSlot>,
}

impl Bootstrapper {
    pub fn new(
        gateway: Arc<dyn IProviderGateway>,
        gate: Arc<CredentialGate>,
        manager: Arc<SubscriptionManager>,
        engine: Arc<ReconciliationEngine>,
        drive: Arc<DriveSlot>,
    ) -> Self {
        Self {
            gateway,
            gate,
            manager,
            engine,
            drive,
        }
    }

    /// Runs the full bootstrap sequence
    ///
    /// The gate is enabled only after every step succeeded; a failure at
    /// any point leaves it closed (and a failed validation closes it
    /// explicitly, in case a previous bootstrap had opened it).
    pub async fn run(&self) -> Result<BootstrapReport, BootstrapError> {
        let principal = match self.gate.validate(self.gateway.as_ref()).await {
            Ok(principal) => principal,
            Err(reason) => {
                warn!(%reason, "Bootstrap rejected: credential did not validate");
                self.gate.disable();
                return Err(BootstrapError::Unauthorized(reason));
            }
        };

        info!(principal = %principal.principal_name, "Credential validated");

        let drive_id = self.gateway.resolve_default_drive().await?;
        self.drive.set(drive_id.clone());

        let subscription = self.manager.ensure_live(WATCHED_RESOURCE).await?;
        let outcome = self.engine.initial_sync(&drive_id).await?;

        self.gate.enable();

        info!(
            drive = %drive_id,
            subscription = %subscription.provider_id,
            items = outcome.items_processed,
            "Bootstrap complete, gate enabled"
        );

        Ok(BootstrapReport {
            principal: principal.principal_name,
            drive_id: drive_id.as_str().to_string(),
            subscription_id: subscription.provider_id,
            items_processed: outcome.items_processed,
        })
    }
}
