//! Drivetrail Graph - Microsoft Graph API gateway
//!
//! Typed wrapper over the Graph REST surface used by the reconciliation
//! pipeline:
//! - Identity probe (`/me`) for credential validation
//! - Default drive resolution (`/me/drive`)
//! - Delta queries with transparent pagination
//! - Webhook subscription CRUD
//!
//! Every operation surfaces the four-variant
//! [`GatewayError`](drivetrail_core::ports::provider::GatewayError)
//! taxonomy; retry with backoff for rate limits and transients happens
//! inside [`GraphGateway`] before an error escapes.

pub mod client;
pub mod delta;
pub mod error;
pub mod gateway;
pub mod retry;
pub mod subscriptions;

pub use client::GraphClient;
pub use gateway::GraphGateway;
