//! Shared fixtures for reconciliation and subscription tests
//!
//! A scripted in-memory gateway stands in for the provider; persistence
//! runs against the real SQLite store on an in-memory pool.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use drivetrail_core::domain::{DeltaToken, DriveId};
use drivetrail_core::ports::provider::{
    DeltaBatch, GatewayError, IProviderGateway, IdentityProbe, Principal, ProviderSubscription,
    RemoteChange,
};
use drivetrail_store::{DatabasePool, SqliteStateStore};
use drivetrail_sync::ReconciliationEngine;

/// Fixed observation timestamp so replayed pages compare equal
pub fn t0() -> DateTime<Utc> {
    "2026-07-01T10:00:00Z".parse().unwrap()
}

pub fn folder(id: &str, name: &str, parent: Option<&str>) -> RemoteChange {
    RemoteChange {
        external_id: id.to_string(),
        name: name.to_string(),
        parent_external_id: parent.map(str::to_string),
        is_folder: true,
        is_deleted: false,
        created: Some(t0()),
        modified: Some(t0()),
    }
}

pub fn file(id: &str, name: &str, parent: Option<&str>) -> RemoteChange {
    RemoteChange {
        external_id: id.to_string(),
        name: name.to_string(),
        parent_external_id: parent.map(str::to_string),
        is_folder: false,
        is_deleted: false,
        created: Some(t0()),
        modified: Some(t0()),
    }
}

pub fn file_modified_at(
    id: &str,
    name: &str,
    parent: Option<&str>,
    modified: DateTime<Utc>,
) -> RemoteChange {
    RemoteChange {
        modified: Some(modified),
        ..file(id, name, parent)
    }
}

pub fn tombstone(id: &str) -> RemoteChange {
    RemoteChange {
        external_id: id.to_string(),
        name: String::new(),
        parent_external_id: None,
        is_folder: false,
        is_deleted: true,
        created: None,
        modified: None,
    }
}

/// Scripted gateway: delta batches are consumed front-to-back, and the
/// subscription side behaves like a tiny in-memory provider.
pub struct FakeGateway {
    batches: Mutex<VecDeque<Result<DeltaBatch, GatewayError>>>,
    pub delta_calls: AtomicUsize,
    pub cursors_seen: Mutex<Vec<Option<String>>>,
    pub provider_subs: Mutex<HashMap<String, ProviderSubscription>>,
    pub create_calls: AtomicUsize,
    pub renew_calls: AtomicUsize,
    next_sub: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(VecDeque::new()),
            delta_calls: AtomicUsize::new(0),
            cursors_seen: Mutex::new(Vec::new()),
            provider_subs: Mutex::new(HashMap::new()),
            create_calls: AtomicUsize::new(0),
            renew_calls: AtomicUsize::new(0),
            next_sub: AtomicUsize::new(0),
        }
    }

    /// Queues a successful delta batch
    pub fn push_batch(&self, changes: Vec<RemoteChange>, cursor: &str) {
        self.batches.lock().unwrap().push_back(Ok(DeltaBatch {
            changes,
            cursor: DeltaToken::new(cursor).unwrap(),
        }));
    }

    /// Queues a failing delta response
    pub fn push_error(&self, err: GatewayError) {
        self.batches.lock().unwrap().push_back(Err(err));
    }

    /// Overrides the provider-side expiry of a subscription
    pub fn set_provider_expiry(&self, provider_id: &str, expires_at: DateTime<Utc>) {
        if let Some(sub) = self.provider_subs.lock().unwrap().get_mut(provider_id) {
            sub.expires_at = expires_at;
        }
    }

    /// Simulates the provider forgetting a subscription
    pub fn forget_subscription(&self, provider_id: &str) {
        self.provider_subs.lock().unwrap().remove(provider_id);
    }
}

#[async_trait::async_trait]
impl IProviderGateway for FakeGateway {
    async fn probe_identity(&self) -> IdentityProbe {
        IdentityProbe::Valid(Principal {
            user_id: "user-1".to_string(),
            principal_name: "user@example.com".to_string(),
        })
    }

    async fn resolve_default_drive(&self) -> Result<DriveId, GatewayError> {
        Ok(DriveId::new("drive-1").unwrap())
    }

    async fn delta_complete(
        &self,
        _drive_id: &DriveId,
        cursor: Option<&DeltaToken>,
    ) -> Result<DeltaBatch, GatewayError> {
        self.delta_calls.fetch_add(1, Ordering::SeqCst);
        self.cursors_seen
            .lock()
            .unwrap()
            .push(cursor.map(|c| c.as_str().to_string()));
        self.batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::Fatal("no scripted batch".into())))
    }

    async fn create_subscription(
        &self,
        resource: &str,
        _notification_url: &str,
        _client_state: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<ProviderSubscription, GatewayError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let n = self.next_sub.fetch_add(1, Ordering::SeqCst) + 1;
        let sub = ProviderSubscription {
            id: format!("sub-{n}"),
            resource: resource.to_string(),
            expires_at,
        };
        self.provider_subs
            .lock()
            .unwrap()
            .insert(sub.id.clone(), sub.clone());
        Ok(sub)
    }

    async fn get_subscription(
        &self,
        provider_id: &str,
    ) -> Result<Option<ProviderSubscription>, GatewayError> {
        Ok(self.provider_subs.lock().unwrap().get(provider_id).cloned())
    }

    async fn renew_subscription(
        &self,
        provider_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        self.renew_calls.fetch_add(1, Ordering::SeqCst);
        match self.provider_subs.lock().unwrap().get_mut(provider_id) {
            Some(sub) => {
                sub.expires_at = expires_at;
                Ok(())
            }
            None => Err(GatewayError::Fatal(
                "renew subscription: HTTP 404".to_string(),
            )),
        }
    }

    async fn delete_subscription(&self, provider_id: &str) -> Result<(), GatewayError> {
        self.provider_subs.lock().unwrap().remove(provider_id);
        Ok(())
    }
}

/// Engine wired to a scripted gateway and a real in-memory store
pub struct Fixture {
    pub gateway: Arc<FakeGateway>,
    pub store: Arc<SqliteStateStore>,
    pub engine: Arc<ReconciliationEngine>,
    pub drive: DriveId,
}

pub async fn fixture() -> Fixture {
    let pool = DatabasePool::in_memory().await.unwrap();
    let store = Arc::new(SqliteStateStore::new(pool.pool().clone()));
    let gateway = Arc::new(FakeGateway::new());
    let engine = Arc::new(ReconciliationEngine::new(
        gateway.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
    ));
    Fixture {
        gateway,
        store,
        engine,
        drive: DriveId::new("drive-1").unwrap(),
    }
}
