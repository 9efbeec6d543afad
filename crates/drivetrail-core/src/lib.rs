//! Drivetrail Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Item`, `ChangeEvent`, `DriveCursor`, `Subscription`
//! - **Port definitions** - Traits for adapters: `IProviderGateway`, the
//!   store repositories, `ISyncQueue`
//! - **Credential gate** - Process-wide flag enabling/disabling all workers
//! - **Configuration** - Typed config with validation
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no external dependencies.
//! Ports define trait interfaces that adapter crates implement.

pub mod config;
pub mod domain;
pub mod gate;
pub mod ports;
