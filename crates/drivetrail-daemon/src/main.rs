//! Drivetrail Daemon - drive mirroring and audit service
//!
//! Wires the pieces together and runs them until a shutdown signal:
//! - HTTP surface (`/bootstrap`, `/notify`)
//! - Reconcile worker consuming the notification queue
//! - Periodic subscription maintenance (renewal and sweep)

mod bootstrap;
mod http;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use drivetrail_core::config::Config;
use drivetrail_core::gate::CredentialGate;
use drivetrail_graph::GraphGateway;
use drivetrail_store::{DatabasePool, SqliteStateStore};
use drivetrail_sync::{
    BoundedSyncQueue, DriveSlot, ReconcileWorker, ReconciliationEngine, SubscriptionManager,
};

use crate::bootstrap::{Bootstrapper, WATCHED_RESOURCE};
use crate::http::{ApiServer, AppState};

#[derive(Debug, Parser)]
#[command(name = "drivetraild", about = "Drivetrail mirroring daemon", version)]
struct Args {
    /// Path to the configuration file (defaults to the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn init_tracing(config: &drivetrail_core::config::LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config_path = args.config.unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let errors = config.validate();
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("config error: {error}");
        }
        anyhow::bail!("invalid configuration ({} errors)", errors.len());
    }

    init_tracing(&config.logging);
    info!(config = %config_path.display(), "Drivetrail daemon starting");

    // Persistence
    let pool = DatabasePool::new(&config.store.path).await?;
    let store = Arc::new(SqliteStateStore::new(pool.pool().clone()));

    // Provider gateway and credential gate
    let gateway = Arc::new(GraphGateway::new(config.provider.bearer.clone()));
    let gate = Arc::new(CredentialGate::new(config.sync.delta_enabled));

    // Reconciliation pipeline
    let queue = Arc::new(BoundedSyncQueue::new(config.sync.queue_capacity));
    let engine = Arc::new(
        ReconciliationEngine::new(
            gateway.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
        )
        .with_metadata_updates(config.sync.emit_metadata_updates),
    );
    let manager = Arc::new(SubscriptionManager::new(
        gateway.clone(),
        store.clone(),
        &config.subscriptions,
    ));
    let drive = Arc::new(DriveSlot::empty());

    let bootstrapper = Bootstrapper::new(
        gateway.clone(),
        gate.clone(),
        manager.clone(),
        engine.clone(),
        drive.clone(),
    );
    let worker = Arc::new(ReconcileWorker::new(
        queue.clone(),
        gate.clone(),
        engine.clone(),
        drive.clone(),
    ));

    let state = Arc::new(AppState {
        bootstrapper,
        manager: manager.clone(),
        queue: queue.clone(),
    });
    let server = ApiServer::new(state, &config.http.bind)?;

    let shutdown = CancellationToken::new();

    let worker_task = tokio::spawn({
        let worker = worker.clone();
        let token = shutdown.clone();
        async move { worker.run(token).await }
    });

    let maintenance_task = tokio::spawn(maintenance_loop(
        manager.clone(),
        gate.clone(),
        Duration::from_secs(config.subscriptions.maintenance_interval_minutes * 60),
        shutdown.clone(),
    ));

    let server_task = tokio::spawn({
        let token = shutdown.clone();
        async move { server.run(token).await }
    });

    shutdown_signal().await;
    info!("Shutdown signal received");
    shutdown.cancel();

    let (worker_res, maintenance_res, server_res) =
        tokio::join!(worker_task, maintenance_task, server_task);
    worker_res.context("worker task panicked")?;
    maintenance_res.context("maintenance task panicked")?;
    server_res.context("server task panicked")??;

    info!("Drivetrail daemon stopped");
    Ok(())
}

/// Completes when SIGINT or SIGTERM is delivered
///
/// Service managers send SIGTERM on stop; both signals request the same
/// graceful drain. On non-Unix platforms ctrl-c alone has to do.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Periodic subscription upkeep: renew before expiry, sweep the dead
///
/// Skips entirely while the gate is closed; a disabled pipeline must not
/// touch the provider.
async fn maintenance_loop(
    manager: Arc<SubscriptionManager>,
    gate: Arc<CredentialGate>,
    every: Duration,
    shutdown: CancellationToken,
) {
    let mut timer = tokio::time::interval(every);
    timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = timer.tick() => {
                if !gate.is_enabled() {
                    continue;
                }

                if let Err(err) = manager.ensure_live(WATCHED_RESOURCE).await {
                    if err.is_auth() {
                        warn!(error = %err, "Credential rejected during maintenance, disabling gate");
                        gate.disable();
                        continue;
                    }
                    warn!(error = %err, "Subscription maintenance failed");
                }
                match manager.sweep_expired().await {
                    Ok(0) => {}
                    Ok(removed) => info!(removed, "Swept expired subscriptions"),
                    Err(err) => warn!(error = %err, "Subscription sweep failed"),
                }
            }
            _ = shutdown.cancelled() => break,
        }
    }
}
