//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IProviderGateway`] - Typed wrapper over the provider's delta feed,
//!   identity probe, and subscription CRUD
//! - [`IItemRepository`] / [`IEventRepository`] / [`ICursorRepository`] /
//!   [`ISubscriptionRepository`] - Persistent state, one trait per relation
//! - [`IChangeApplier`] - The transactional apply-one-item step
//! - [`ISyncQueue`] - Bounded at-least-once queue of reconciliation jobs

pub mod provider;
pub mod queue;
pub mod store;

pub use provider::{
    DeltaBatch, GatewayError, IProviderGateway, IdentityProbe, Principal, ProbeFailure,
    ProviderSubscription, RemoteChange,
};
pub use queue::{ISyncQueue, QueueError, SyncJob};
pub use store::{
    IChangeApplier, ICursorRepository, IEventRepository, IItemRepository,
    ISubscriptionRepository, ItemWrite, StoreError,
};
